//! Canonical table definitions.
//!
//! Each column carries the fill value used when a rebuild copies rows out of
//! an older table that lacks it, and the coercion applied when the older
//! table has it.

/// Storage shape of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `INTEGER PRIMARY KEY AUTOINCREMENT`; copied verbatim, never filled.
    PrimaryKey,
    Integer,
    Real,
    Text,
    /// Text in `CURRENT_TIMESTAMP` form.
    Timestamp,
    /// Optional reference to another table; fills with `NULL`.
    NullableInteger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// SQL literal used as column default and as fill value.
    pub default: &'static str,
}

impl ColumnDef {
    const fn new(name: &'static str, kind: ColumnKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            default,
        }
    }

    /// Column clause for `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let name = self.name;
        let default = self.default;
        match self.kind {
            ColumnKind::PrimaryKey => format!("\"{name}\" INTEGER PRIMARY KEY AUTOINCREMENT"),
            ColumnKind::Integer => format!("\"{name}\" INTEGER NOT NULL DEFAULT {default}"),
            ColumnKind::Real => format!("\"{name}\" REAL NOT NULL DEFAULT {default}"),
            ColumnKind::Text | ColumnKind::Timestamp => {
                format!("\"{name}\" TEXT NOT NULL DEFAULT {default}")
            }
            ColumnKind::NullableInteger => format!("\"{name}\" INTEGER"),
        }
    }

    /// Expression reading this column from an older table that has it.
    ///
    /// Coerces the storage class to the canonical affinity and replaces NULL
    /// in NOT NULL columns with the fill value.
    pub fn copy_expr(&self) -> String {
        let name = self.name;
        let default = self.default;
        match self.kind {
            ColumnKind::PrimaryKey => format!("\"{name}\""),
            ColumnKind::Integer => format!("COALESCE(CAST(\"{name}\" AS INTEGER), {default})"),
            ColumnKind::Real => format!("COALESCE(CAST(\"{name}\" AS REAL), {default})"),
            ColumnKind::Text | ColumnKind::Timestamp => {
                format!("COALESCE(CAST(\"{name}\" AS TEXT), {default})")
            }
            ColumnKind::NullableInteger => format!("CAST(\"{name}\" AS INTEGER)"),
        }
    }

    /// Value for an older table that lacks this column. `None` means the
    /// column is left out of the copy (the primary key gets assigned).
    pub fn fill_expr(&self) -> Option<&'static str> {
        match self.kind {
            ColumnKind::PrimaryKey => None,
            _ => Some(self.default),
        }
    }
}

/// A canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// SQLite column names are case-insensitive.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Name of the temporary table used while rebuilding.
    pub fn shadow_name(&self) -> String {
        format!("{}__shadow", self.name)
    }

    /// `CREATE TABLE` statement for this shape under `table_name`.
    pub fn create_sql(&self, table_name: &str) -> String {
        let columns: Vec<String> = self.columns.iter().map(ColumnDef::definition).collect();
        format!(
            "CREATE TABLE \"{table_name}\" (\n    {}\n)",
            columns.join(",\n    ")
        )
    }
}

use ColumnKind::{Integer, NullableInteger, PrimaryKey, Real, Text, Timestamp};

const ID: ColumnDef = ColumnDef::new("id", PrimaryKey, "NULL");
const CREATED_AT: ColumnDef = ColumnDef::new("created_at", Timestamp, "CURRENT_TIMESTAMP");
const UPDATED_AT: ColumnDef = ColumnDef::new("updated_at", Timestamp, "CURRENT_TIMESTAMP");

pub const PRODUCTS: TableDef = TableDef {
    name: "products",
    columns: &[
        ID,
        ColumnDef::new("name", Text, "''"),
        ColumnDef::new("quantity", Integer, "0"),
        ColumnDef::new("cost_price", Real, "0"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const CUSTOMERS: TableDef = TableDef {
    name: "customers",
    columns: &[
        ID,
        ColumnDef::new("name", Text, "''"),
        ColumnDef::new("phone", Text, "''"),
        ColumnDef::new("email", Text, "''"),
        ColumnDef::new("address", Text, "''"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const ORDERS: TableDef = TableDef {
    name: "orders",
    columns: &[
        ID,
        ColumnDef::new("customer_id", NullableInteger, "NULL"),
        ColumnDef::new("status", Text, "'with_customer'"),
        ColumnDef::new("notes", Text, "''"),
        ColumnDef::new("total_amount", Real, "0"),
        ColumnDef::new("paid_amount", Real, "0"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const ORDER_ITEMS: TableDef = TableDef {
    name: "order_items",
    columns: &[
        ID,
        ColumnDef::new("order_id", Integer, "0"),
        ColumnDef::new("product_id", Integer, "0"),
        ColumnDef::new("quantity", Integer, "0"),
        ColumnDef::new("unit_price", Real, "0"),
        ColumnDef::new("total_price", Real, "0"),
        CREATED_AT,
    ],
};

/// Every table the store owns, in creation order.
pub static CANONICAL: [TableDef; 4] = [PRODUCTS, CUSTOMERS, ORDERS, ORDER_ITEMS];

/// Lookup indexes for reference checks and name resolution.
pub const CANONICAL_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_product_id ON order_items(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_id ON orders(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_name ON products(name)",
    "CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name)",
];

pub fn canonical(name: &str) -> Option<&'static TableDef> {
    CANONICAL.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_column_sets_match_persisted_contract() {
        let names = |t: &TableDef| t.column_names().collect::<Vec<_>>();
        assert_eq!(
            names(&PRODUCTS),
            ["id", "name", "quantity", "cost_price", "created_at", "updated_at"]
        );
        assert_eq!(
            names(&CUSTOMERS),
            ["id", "name", "phone", "email", "address", "created_at", "updated_at"]
        );
        assert_eq!(
            names(&ORDERS),
            [
                "id",
                "customer_id",
                "status",
                "notes",
                "total_amount",
                "paid_amount",
                "created_at",
                "updated_at"
            ]
        );
        assert_eq!(
            names(&ORDER_ITEMS),
            [
                "id",
                "order_id",
                "product_id",
                "quantity",
                "unit_price",
                "total_price",
                "created_at"
            ]
        );
    }

    #[test]
    fn create_sql_renders_every_column() {
        let sql = PRODUCTS.create_sql("products__shadow");
        assert!(sql.starts_with("CREATE TABLE \"products__shadow\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"cost_price\" REAL NOT NULL DEFAULT 0"));
        assert!(sql.contains("\"updated_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn nullable_reference_copies_without_default() {
        let customer_id = ORDERS.columns[1];
        assert_eq!(customer_id.copy_expr(), "CAST(\"customer_id\" AS INTEGER)");
        assert_eq!(customer_id.fill_expr(), Some("NULL"));
        assert_eq!(ID.fill_expr(), None);
    }
}

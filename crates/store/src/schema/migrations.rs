//! Ordered, version-tagged migration list.
//!
//! Applied versions are recorded in `schema_migrations`. Steps still
//! introspect before acting, so a store that predates the marker table (or
//! was shaped by any earlier build) converges to the same result.

use sqlx::SqliteConnection;

use super::rebuild::{TableAction, reconcile_table, table_columns};
use super::tables::{CANONICAL_INDEXES, CUSTOMERS, ORDER_ITEMS, ORDERS, PRODUCTS, TableDef};

pub(crate) const MARKER_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version    INTEGER PRIMARY KEY,
        name       TEXT NOT NULL,
        applied_at TEXT NOT NULL
    )
"#;

/// One step of a migration.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Create the table or shadow-rebuild it to the given shape.
    Reconcile(&'static TableDef),
    /// Copy the product/quantity columns of single-product orders into
    /// `order_items` before the order table loses them.
    LiftLegacyOrderLines,
    /// Idempotent DDL.
    Execute(&'static str),
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::Reconcile(def) => format!("reconcile {}", def.name),
            Step::LiftLegacyOrderLines => "lift legacy order lines".to_string(),
            Step::Execute(sql) => format!("execute `{sql}`"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub steps: &'static [Step],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "canonical_tables",
        steps: &[
            Step::Reconcile(&ORDER_ITEMS),
            Step::LiftLegacyOrderLines,
            Step::Reconcile(&PRODUCTS),
            Step::Reconcile(&CUSTOMERS),
            Step::Reconcile(&ORDERS),
        ],
    },
    Migration {
        version: 2,
        name: "reference_indexes",
        steps: &[
            Step::Execute(CANONICAL_INDEXES[0]),
            Step::Execute(CANONICAL_INDEXES[1]),
            Step::Execute(CANONICAL_INDEXES[2]),
            Step::Execute(CANONICAL_INDEXES[3]),
            Step::Execute(CANONICAL_INDEXES[4]),
        ],
    },
];

/// Highest version known to this build.
pub fn latest_version() -> i64 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Table {
        table: &'static str,
        action: TableAction,
    },
    LiftedLines(u64),
    Executed,
}

pub(crate) async fn apply_step(
    conn: &mut SqliteConnection,
    step: &Step,
) -> Result<StepOutcome, sqlx::Error> {
    match step {
        Step::Reconcile(def) => {
            let action = reconcile_table(conn, def).await?;
            Ok(StepOutcome::Table {
                table: def.name,
                action,
            })
        }
        Step::LiftLegacyOrderLines => lift_legacy_order_lines(conn).await.map(StepOutcome::LiftedLines),
        Step::Execute(sql) => {
            sqlx::query(sql).execute(&mut *conn).await?;
            Ok(StepOutcome::Executed)
        }
    }
}

/// Earlier builds kept one product per order directly on the order row.
/// Each such order becomes one line item, priced from the legacy
/// `products.sale_price` when that column still exists. Orders that already
/// have items are left alone.
async fn lift_legacy_order_lines(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let order_columns = table_columns(conn, "orders").await?;
    let has = |name: &str| order_columns.iter().any(|c| c.eq_ignore_ascii_case(name));
    if !(has("product_id") && has("quantity")) {
        return Ok(0);
    }

    let product_columns = table_columns(conn, "products").await?;
    let unit_price = if product_columns.iter().any(|c| c.eq_ignore_ascii_case("sale_price")) {
        "COALESCE((SELECT CAST(p.sale_price AS REAL) FROM products p WHERE p.id = o.product_id), 0)"
    } else {
        "0"
    };
    let created_at = if has("created_at") {
        "COALESCE(o.created_at, CURRENT_TIMESTAMP)"
    } else {
        "CURRENT_TIMESTAMP"
    };

    let sql = format!(
        r#"
        INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price, created_at)
        SELECT
            o.id,
            CAST(o.product_id AS INTEGER),
            COALESCE(CAST(o.quantity AS INTEGER), 0),
            {unit_price},
            {unit_price} * COALESCE(CAST(o.quantity AS INTEGER), 0),
            {created_at}
        FROM orders o
        WHERE o.product_id IS NOT NULL
          AND NOT EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id)
        "#
    );

    let lifted = sqlx::query(&sql).execute(&mut *conn).await?.rows_affected();
    if lifted > 0 {
        tracing::info!(lines = lifted, "legacy single-product orders lifted into order_items");
    }
    Ok(lifted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        let versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(latest_version(), *versions.last().unwrap());
    }

    #[test]
    fn first_migration_reconciles_every_canonical_table() {
        let reconciled: Vec<&str> = MIGRATIONS[0]
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Reconcile(def) => Some(def.name),
                _ => None,
            })
            .collect();
        for def in super::super::tables::CANONICAL.iter() {
            assert!(reconciled.contains(&def.name), "{} not reconciled", def.name);
        }
    }

    #[test]
    fn lift_runs_before_orders_lose_their_columns() {
        let steps = MIGRATIONS[0].steps;
        let lift = steps
            .iter()
            .position(|s| matches!(s, Step::LiftLegacyOrderLines))
            .unwrap();
        let orders = steps
            .iter()
            .position(|s| matches!(s, Step::Reconcile(def) if def.name == "orders"))
            .unwrap();
        let items = steps
            .iter()
            .position(|s| matches!(s, Step::Reconcile(def) if def.name == "order_items"))
            .unwrap();
        assert!(items < lift && lift < orders);
    }
}

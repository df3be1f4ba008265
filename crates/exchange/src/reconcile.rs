//! Additive import of a workbook into the store.
//!
//! Records are matched across the boundary by exact name only. Every product
//! and customer row becomes a new record; nothing is deduplicated or updated,
//! so importing the same workbook twice doubles its content.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use shopledger_core::{CustomerId, NewOrder, NewOrderItem, ProductId};
use shopledger_store::{Catalog, Customers, Ledger, NameIndex, Resolved, Store};

use crate::codec::{
    self, CUSTOMERS_SHEET, KEY_COLUMNS, ORDERS_SHEET, OrderRow, PRODUCTS_SHEET, REQUIRED_SHEETS,
    RowError,
};
use crate::error::{ExchangeError, ExchangeResult};
use crate::workbook::Workbook;

/// Imported and failed row counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub imported: usize,
    pub errors: usize,
}

/// A reference that was resolved by tie-break or not at all. The row itself
/// was still applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    /// The order was created without a customer.
    UnresolvedCustomer {
        order: String,
        line: usize,
        name: String,
    },
    /// The order was created without this item.
    UnresolvedProduct {
        order: String,
        line: usize,
        name: String,
    },
    /// Several records share the name; the earliest created one was used.
    AmbiguousName {
        entity: &'static str,
        name: String,
        candidates: usize,
        chosen: i64,
    },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedCustomer { order, line, name } => {
                write!(f, "order {order} (line {line}): customer {name:?} not found")
            }
            Self::UnresolvedProduct { order, line, name } => {
                write!(f, "order {order} (line {line}): product {name:?} not found")
            }
            Self::AmbiguousName {
                entity,
                name,
                candidates,
                chosen,
            } => write!(
                f,
                "{candidates} {entity}s named {name:?}; used the earliest ({entity} {chosen})"
            ),
        }
    }
}

/// Result of a completed import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub products: Tally,
    pub customers: Tally,
    pub orders: Tally,
    /// Order items attached to imported orders.
    pub items: Tally,
    pub row_errors: Vec<RowError>,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    pub fn total_imported(&self) -> usize {
        self.products.imported + self.customers.imported + self.orders.imported
    }

    pub fn total_errors(&self) -> usize {
        self.products.errors + self.customers.errors + self.orders.errors
    }

    /// Per-entity summary in the wording shown to the shop owner.
    pub fn summary(&self) -> String {
        let mut message = String::from("Importação concluída!\n\n");
        for (label, tally) in [
            ("Produtos", self.products),
            ("Clientes", self.customers),
            ("Pedidos", self.orders),
        ] {
            message.push_str(&format!(
                "{label}: {} importados, {} erros\n",
                tally.imported, tally.errors
            ));
        }
        if !self.warnings.is_empty() {
            message.push_str(&format!("\n{} aviso(s) de referência.\n", self.warnings.len()));
        }
        if self.total_errors() > 0 {
            message.push_str("\nVerifique os detalhes dos erros no relatório.");
        }
        message
    }

    fn fail(&mut self, sheet: &'static str, line: usize, reason: impl ToString) {
        let tally = match sheet {
            PRODUCTS_SHEET => &mut self.products,
            CUSTOMERS_SHEET => &mut self.customers,
            _ => &mut self.orders,
        };
        tally.errors += 1;
        self.row_errors.push(RowError {
            sheet,
            line,
            reason: reason.to_string(),
        });
    }
}

/// What a caller without access to the error types gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    pub report: Option<ImportReport>,
}

impl From<ExchangeResult<ImportReport>> for ImportOutcome {
    fn from(result: ExchangeResult<ImportReport>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                message: report.summary(),
                report: Some(report),
            },
            Err(ExchangeError::Structural { missing }) => Self {
                success: false,
                message: format!(
                    "Arquivo inválido. Faltam as abas: {}. Use um arquivo exportado pelo próprio app.",
                    missing.join(", ")
                ),
                report: None,
            },
            Err(ExchangeError::MissingColumns { missing }) => Self {
                success: false,
                message: format!(
                    "Arquivo inválido. Faltam as colunas: {}. Use um arquivo exportado pelo próprio app.",
                    missing.join(", ")
                ),
                report: None,
            },
            Err(e) => Self {
                success: false,
                message: format!("Erro ao importar dados: {e}"),
                report: None,
            },
        }
    }
}

/// Applies workbooks to the store.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    catalog: Catalog,
    customers: Customers,
    ledger: Ledger,
}

impl ReconciliationEngine {
    pub fn new(store: Store) -> Self {
        Self::with_ledger(Ledger::new(store))
    }

    /// Use a ledger configured by the caller (overpayment policy).
    pub fn with_ledger(ledger: Ledger) -> Self {
        let store = ledger.store().clone();
        Self {
            catalog: Catalog::new(store.clone()),
            customers: Customers::new(store),
            ledger,
        }
    }

    /// Read the workbook directory at `dir` and import it.
    pub async fn import_dir(&self, dir: &Path) -> ExchangeResult<ImportReport> {
        let workbook = Workbook::read_dir(dir)?;
        self.import_all(&workbook).await
    }

    /// Import products, then customers, then orders.
    ///
    /// Fails as a whole only when a required sheet or key column is missing
    /// (before any write) or when storage fails while building the name indexes. Every
    /// per-row problem is tallied in the report.
    pub async fn import_all(&self, workbook: &Workbook) -> ExchangeResult<ImportReport> {
        let missing = workbook.missing_sheets(&REQUIRED_SHEETS);
        if !missing.is_empty() {
            tracing::warn!(?missing, "import refused: required sheets missing");
            return Err(ExchangeError::Structural { missing });
        }
        let missing = workbook.missing_columns(&KEY_COLUMNS);
        if !missing.is_empty() {
            tracing::warn!(?missing, "import refused: required columns missing");
            return Err(ExchangeError::MissingColumns { missing });
        }
        let (Some(products), Some(customers), Some(orders)) = (
            workbook.sheet(PRODUCTS_SHEET),
            workbook.sheet(CUSTOMERS_SHEET),
            workbook.sheet(ORDERS_SHEET),
        ) else {
            return Err(ExchangeError::Structural {
                missing: REQUIRED_SHEETS.iter().map(|s| s.to_string()).collect(),
            });
        };

        let products = codec::decode_products(products);
        let customers = codec::decode_customers(customers);
        let orders = codec::decode_orders(orders);

        let mut report = ImportReport::default();
        for error in products
            .errors
            .iter()
            .chain(&customers.errors)
            .chain(&orders.errors)
        {
            report.fail(error.sheet, error.line, &error.reason);
        }

        for (line, draft) in &products.rows {
            match self.catalog.create(draft).await {
                Ok(_) => report.products.imported += 1,
                Err(e) => report.fail(PRODUCTS_SHEET, *line, e),
            }
        }
        for (line, draft) in &customers.rows {
            match self.customers.create(draft).await {
                Ok(_) => report.customers.imported += 1,
                Err(e) => report.fail(CUSTOMERS_SHEET, *line, e),
            }
        }

        let product_index = NameIndex::build(&self.catalog.list().await?);
        let customer_index = NameIndex::build(&self.customers.list().await?);
        let mut resolver = Resolver {
            products: product_index,
            customers: customer_index,
            report: &mut report,
            ambiguous: HashSet::new(),
        };
        let groups = group_by_order(&orders.rows);
        for group in &groups {
            self.import_order(group, &mut resolver).await;
        }

        tracing::info!(
            products = report.products.imported,
            customers = report.customers.imported,
            orders = report.orders.imported,
            items = report.items.imported,
            errors = report.total_errors(),
            warnings = report.warnings.len(),
            "import finished"
        );
        Ok(report)
    }

    /// Create one order from the first row of its group, then attach the
    /// item of every row in the group.
    async fn import_order(&self, group: &OrderGroup<'_>, resolver: &mut Resolver<'_>) {
        let (first_line, first) = group.rows[0];

        let customer_id = if first.customer_name.is_empty() {
            None
        } else {
            let found = resolver.customer(&first.customer_name);
            if found.is_none() {
                resolver.report.warnings.push(ImportWarning::UnresolvedCustomer {
                    order: first.external_id.clone(),
                    line: first_line,
                    name: first.customer_name.clone(),
                });
            }
            found
        };

        let new = NewOrder {
            customer_id,
            status: first.status.clone(),
            notes: first.notes.clone(),
            paid_amount: first.paid_amount,
        };
        let order = match self.ledger.record_order(&new, first.total_amount).await {
            Ok(order) => order,
            Err(e) => {
                resolver.report.fail(ORDERS_SHEET, first_line, e);
                return;
            }
        };
        resolver.report.orders.imported += 1;

        for &(line, row) in &group.rows {
            let Some(cells) = &row.item else { continue };
            let Some(product_id) = resolver.product(&cells.product_name) else {
                tracing::warn!(order = %row.external_id, product = %cells.product_name, "product not found");
                resolver.report.warnings.push(ImportWarning::UnresolvedProduct {
                    order: row.external_id.clone(),
                    line,
                    name: cells.product_name.clone(),
                });
                continue;
            };
            let item = NewOrderItem {
                product_id,
                quantity: cells.quantity,
                unit_price: cells.unit_price,
                total_price: cells.total_price,
            };
            match self.ledger.add_item(order.id, &item).await {
                Ok(_) => resolver.report.items.imported += 1,
                Err(e) => {
                    resolver.report.items.errors += 1;
                    resolver.report.fail(ORDERS_SHEET, line, e);
                }
            }
        }
    }
}

/// Name indexes plus the report that collects ambiguity warnings.
struct Resolver<'r> {
    products: NameIndex<ProductId>,
    customers: NameIndex<CustomerId>,
    report: &'r mut ImportReport,
    /// `(entity, name)` pairs already reported as ambiguous.
    ambiguous: HashSet<(&'static str, String)>,
}

impl Resolver<'_> {
    fn product(&mut self, name: &str) -> Option<ProductId> {
        let found = self.products.resolve(name);
        self.note("product", name, found)
    }

    fn customer(&mut self, name: &str) -> Option<CustomerId> {
        let found = self.customers.resolve(name);
        self.note("customer", name, found)
    }

    fn note<Id: Copy + Into<i64>>(
        &mut self,
        entity: &'static str,
        name: &str,
        found: Option<Resolved<Id>>,
    ) -> Option<Id> {
        let found = found?;
        if found.is_ambiguous() && self.ambiguous.insert((entity, name.trim().to_string())) {
            let chosen: i64 = found.id.into();
            tracing::warn!(entity, name, candidates = found.candidates, chosen, "ambiguous name");
            self.report.warnings.push(ImportWarning::AmbiguousName {
                entity,
                name: name.trim().to_string(),
                candidates: found.candidates,
                chosen,
            });
        }
        Some(found.id)
    }
}

/// Rows sharing one external order id, in file order.
struct OrderGroup<'a> {
    rows: Vec<(usize, &'a OrderRow)>,
}

/// Group by external id, groups in first-seen order.
fn group_by_order(rows: &[(usize, OrderRow)]) -> Vec<OrderGroup<'_>> {
    let mut groups: Vec<OrderGroup<'_>> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (line, row) in rows {
        match position.get(row.external_id.as_str()) {
            Some(&i) => groups[i].rows.push((*line, row)),
            None => {
                position.insert(row.external_id.as_str(), groups.len());
                groups.push(OrderGroup {
                    rows: vec![(*line, row)],
                });
            }
        }
    }
    groups
}

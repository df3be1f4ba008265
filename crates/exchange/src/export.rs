//! Workbook exports written under an export directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use shopledger_reports::{Dataset, FinancialSummary, summarize, top_products, windowed};
use shopledger_store::{Catalog, Customers, Ledger, Store};

use crate::codec::{self, OrderExport};
use crate::error::ExchangeResult;
use crate::workbook::{Sheet, Workbook};

pub const SUMMARY_SHEET: &str = "Resumo";
pub const TOP_PRODUCTS_SHEET: &str = "Mais Vendidos";

/// Window of the second summary column.
pub const REPORT_WINDOW_DAYS: u32 = 30;
/// Rows of the best-sellers sheet.
pub const REPORT_TOP_N: usize = 10;

/// Reads the store and writes workbooks.
#[derive(Debug, Clone)]
pub struct Exporter {
    store: Store,
    catalog: Catalog,
    customers: Customers,
    ledger: Ledger,
}

impl Exporter {
    pub fn new(store: Store) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            customers: Customers::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            store,
        }
    }

    /// Full three-sheet workbook; re-imports by the same contract.
    pub async fn workbook(&self) -> ExchangeResult<Workbook> {
        let products = self.catalog.list().await?;
        let customers = self.customers.list().await?;

        let mut orders = Vec::new();
        for summary in self.ledger.list_orders().await? {
            let lines = self.ledger.items_for_order(summary.order.id).await?;
            orders.push(OrderExport { summary, lines });
        }

        let mut workbook = Workbook::new();
        workbook.add_sheet(codec::encode_products(&products));
        workbook.add_sheet(codec::encode_customers(&customers));
        workbook.add_sheet(codec::encode_orders(&orders));
        Ok(workbook)
    }

    /// Write the full workbook to `Loja_<date>_<HH-MM>/` under `dir`.
    pub async fn export_all(&self, dir: &Path, at: NaiveDateTime) -> ExchangeResult<PathBuf> {
        let workbook = self.workbook().await?;
        let target = dir.join(format!("Loja_{}", at.format("%Y-%m-%d_%H-%M")));
        workbook.write_dir(&target)?;
        tracing::info!(path = %target.display(), "full export written");
        Ok(target)
    }

    /// Write only the products sheet to `Produtos_<date>/` under `dir`.
    pub async fn export_products(&self, dir: &Path, at: NaiveDateTime) -> ExchangeResult<PathBuf> {
        let products = self.catalog.list().await?;
        let mut workbook = Workbook::new();
        workbook.add_sheet(codec::encode_products(&products));

        let target = dir.join(format!("Produtos_{}", at.format("%Y-%m-%d")));
        workbook.write_dir(&target)?;
        tracing::info!(path = %target.display(), products = products.len(), "product export written");
        Ok(target)
    }

    /// Write the financial summary and best sellers to
    /// `RelatorioFinanceiro_<date>/` under `dir`.
    pub async fn export_report(&self, dir: &Path, now: DateTime<Utc>) -> ExchangeResult<PathBuf> {
        let data = Dataset::load(&self.store).await?;
        let workbook = report_workbook(&data, now);

        let target = dir.join(format!("RelatorioFinanceiro_{}", now.format("%Y-%m-%d")));
        workbook.write_dir(&target)?;
        tracing::info!(path = %target.display(), "financial report written");
        Ok(target)
    }
}

fn report_workbook(data: &Dataset, now: DateTime<Utc>) -> Workbook {
    let all = summarize(data);
    let recent = windowed(data, REPORT_WINDOW_DAYS, now);
    let recent_header = format!("Últimos {REPORT_WINDOW_DAYS} dias");

    let mut summary = Sheet::new(SUMMARY_SHEET, &["Indicador", "Total", recent_header.as_str()]);
    let rows: [(&str, fn(&FinancialSummary) -> String); 6] = [
        ("Receita", |s| s.revenue.to_string()),
        ("Custo", |s| s.cost.to_string()),
        ("Lucro", |s| s.profit.to_string()),
        ("A Receber", |s| s.outstanding.to_string()),
        ("Pedidos", |s| s.order_count.to_string()),
        ("Pedidos Pagos", |s| s.paid_order_count.to_string()),
    ];
    for (label, value) in rows {
        summary.push_row(vec![label.to_string(), value(&all), value(&recent)]);
    }

    let mut top = Sheet::new(
        TOP_PRODUCTS_SHEET,
        &["Produto", "Quantidade Vendida", "Receita Total"],
    );
    for entry in top_products(data, REPORT_TOP_N) {
        top.push_row(vec![
            entry.name,
            entry.total_sold.to_string(),
            entry.total_revenue.to_string(),
        ]);
    }

    let mut workbook = Workbook::new();
    workbook.add_sheet(summary);
    workbook.add_sheet(top);
    workbook
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use shopledger_core::{NewOrder, NewOrderItem, ProductDraft};
    use shopledger_store::SchemaStore;

    use super::*;
    use crate::codec::{CUSTOMERS_SHEET, ORDERS_SHEET, PRODUCTS_SHEET};

    async fn seeded() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        SchemaStore::new(store.clone()).ensure_schema().await.unwrap();
        let body = Catalog::new(store.clone())
            .create(&ProductDraft::new("Body", 4, 30.0))
            .await
            .unwrap();
        let ledger = Ledger::new(store.clone());
        let order = ledger
            .create_order(&NewOrder {
                paid_amount: 80.0,
                ..NewOrder::default()
            })
            .await
            .unwrap();
        ledger
            .replace_items(order.id, &[NewOrderItem::priced(body.id, 2, 60.0)])
            .await
            .unwrap();
        ledger.set_total_amount(order.id, 120.0).await.unwrap();
        store
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn full_export_writes_three_sheets_into_a_stamped_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(seeded().await);

        let path = exporter.export_all(dir.path(), stamp()).await.unwrap();

        assert_eq!(path, dir.path().join("Loja_2024-06-01_09-05"));
        let written = Workbook::read_dir(&path).unwrap();
        assert_eq!(written.sheet(PRODUCTS_SHEET).unwrap().len(), 1);
        assert!(written.sheet(CUSTOMERS_SHEET).unwrap().is_empty());
        assert_eq!(written.sheet(ORDERS_SHEET).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn product_export_has_only_products() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(seeded().await);

        let path = exporter.export_products(dir.path(), stamp()).await.unwrap();

        let written = Workbook::read_dir(&path).unwrap();
        assert_eq!(written.sheet_names().collect::<Vec<_>>(), [PRODUCTS_SHEET]);
    }

    #[tokio::test]
    async fn report_lists_summary_and_best_sellers() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded().await;
        let exporter = Exporter::new(store);
        let now = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();

        let path = exporter.export_report(dir.path(), now).await.unwrap();

        let written = Workbook::read_dir(&path).unwrap();
        let summary = written.sheet(SUMMARY_SHEET).unwrap();
        let rows: Vec<_> = summary.records().collect();
        assert_eq!(rows[0].get("Indicador"), "Receita");
        assert_eq!(rows[0].get("Total"), "80");
        assert_eq!(rows[1].get("Total"), "60");
        assert_eq!(rows[3].get("Total"), "40");
        // Every order predates the window.
        assert_eq!(rows[0].get("Últimos 30 dias"), "0");

        let top = written.sheet(TOP_PRODUCTS_SHEET).unwrap();
        let first = top.records().next().unwrap();
        assert_eq!(first.get("Produto"), "Body");
        assert_eq!(first.get("Quantidade Vendida"), "2");
        assert_eq!(first.get("Receita Total"), "120");
    }
}

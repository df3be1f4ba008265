//! Entity ⇄ sheet mapping.
//!
//! Encoding writes the full exported column set, informational columns
//! included. Decoding reads only the columns import needs, tolerates any of
//! them being absent, and never fails as a whole: a row without its key
//! column is skipped and reported.

use serde::Serialize;

use shopledger_core::{Customer, CustomerDraft, OrderStatus, Product, ProductDraft, time};
use shopledger_store::{OrderLineView, OrderSummary};

use crate::workbook::{Record, Sheet};

pub const PRODUCTS_SHEET: &str = "Produtos";
pub const CUSTOMERS_SHEET: &str = "Clientes";
pub const ORDERS_SHEET: &str = "Pedidos";

/// Sheets an import cannot proceed without.
pub const REQUIRED_SHEETS: [&str; 3] = [PRODUCTS_SHEET, CUSTOMERS_SHEET, ORDERS_SHEET];

/// Column each required sheet cannot be read without, as `(sheet, header)`.
pub const KEY_COLUMNS: [(&str, &str); 3] = [
    (PRODUCTS_SHEET, columns::NAME),
    (CUSTOMERS_SHEET, columns::NAME),
    (ORDERS_SHEET, columns::ORDER_ID),
];

/// Exported in place of a missing customer name.
pub const UNKNOWN_CUSTOMER: &str = "Cliente não informado";

/// Column headers.
pub mod columns {
    pub const ID: &str = "ID";
    pub const NAME: &str = "Nome";
    pub const STOCK: &str = "Quantidade em Estoque";
    pub const COST_PRICE: &str = "Preço de Custo";
    pub const CREATED: &str = "Data de Criação";
    pub const UPDATED: &str = "Data de Atualização";

    pub const PHONE: &str = "Telefone";
    pub const EMAIL: &str = "Email";
    pub const ADDRESS: &str = "Endereço";

    pub const ORDER_ID: &str = "ID do Pedido";
    pub const CUSTOMER: &str = "Cliente";
    pub const STATUS: &str = "Status";
    pub const ORDER_TOTAL: &str = "Total do Pedido";
    pub const PAID: &str = "Valor Pago";
    pub const REMAINING: &str = "Valor a Receber";
    pub const NOTES: &str = "Observações";
    pub const ORDER_DATE: &str = "Data do Pedido";
    pub const ITEM: &str = "Item";
    pub const PRODUCT: &str = "Produto";
    pub const QUANTITY: &str = "Quantidade";
    pub const UNIT_PRICE: &str = "Preço Unitário";
    pub const ITEM_TOTAL: &str = "Total do Item";
    pub const UNIT_COST: &str = "Custo Unitário";
    pub const ITEM_COST: &str = "Custo Total do Item";
}

use columns as col;

const PRODUCT_HEADERS: [&str; 6] = [col::ID, col::NAME, col::STOCK, col::COST_PRICE, col::CREATED, col::UPDATED];

const CUSTOMER_HEADERS: [&str; 7] = [
    col::ID,
    col::NAME,
    col::PHONE,
    col::EMAIL,
    col::ADDRESS,
    col::CREATED,
    col::UPDATED,
];

const ORDER_HEADERS: [&str; 15] = [
    col::ORDER_ID,
    col::CUSTOMER,
    col::STATUS,
    col::ORDER_TOTAL,
    col::PAID,
    col::REMAINING,
    col::NOTES,
    col::ORDER_DATE,
    col::ITEM,
    col::PRODUCT,
    col::QUANTITY,
    col::UNIT_PRICE,
    col::ITEM_TOTAL,
    col::UNIT_COST,
    col::ITEM_COST,
];

/// A row that could not be decoded or applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub sheet: &'static str,
    pub line: usize,
    pub reason: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} line {}: {}", self.sheet, self.line, self.reason)
    }
}

/// Decoded rows plus the rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub rows: Vec<(usize, T)>,
    pub errors: Vec<RowError>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// One line of the orders sheet as import sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    /// Order id as written in the file; only meaningful inside that file.
    pub external_id: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub notes: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub item: Option<ItemCells>,
}

/// Item columns of an order row that names a product and a quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCells {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// An order with its lines, ready to encode.
#[derive(Debug, Clone)]
pub struct OrderExport {
    pub summary: OrderSummary,
    pub lines: Vec<OrderLineView>,
}

/// Parse a numeric cell. Anything unparseable reads as 0.
///
/// Accepts a leading `R$`, and `.` or `,` as decimal separator. A lone
/// separator is always the decimal point, so `1.234` is 1.234. Thousands
/// grouping is recognised when both separators appear (`1.234,56`,
/// `1,234.56`) or one of them repeats (`1.234.567`, `1,234,567`).
pub fn parse_number(cell: &str) -> f64 {
    let cleaned: String = cell
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // 1.234,56
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        // 1,234.56
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        (Some(_), None) if cleaned.matches(',').count() > 1 => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    match normalized.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Whole-number cell; fractional input is rounded.
pub fn parse_count(cell: &str) -> i64 {
    parse_number(cell).round() as i64
}

/// Shortest text that parses back to the same value.
fn number(value: f64) -> String {
    value.to_string()
}

pub fn encode_products(products: &[Product]) -> Sheet {
    let mut sheet = Sheet::new(PRODUCTS_SHEET, &PRODUCT_HEADERS);
    for p in products {
        sheet.push_row(vec![
            p.id.to_string(),
            p.name.clone(),
            p.quantity.to_string(),
            number(p.cost_price),
            time::to_display_date(p.created_at),
            time::to_display_date(p.updated_at),
        ]);
    }
    sheet
}

pub fn encode_customers(customers: &[Customer]) -> Sheet {
    let mut sheet = Sheet::new(CUSTOMERS_SHEET, &CUSTOMER_HEADERS);
    for c in customers {
        sheet.push_row(vec![
            c.id.to_string(),
            c.name.clone(),
            c.phone.clone(),
            c.email.clone(),
            c.address.clone(),
            time::to_display_date(c.created_at),
            time::to_display_date(c.updated_at),
        ]);
    }
    sheet
}

/// One row per item with the order fields repeated, or a single row with
/// empty item cells for an order without items.
pub fn encode_orders(orders: &[OrderExport]) -> Sheet {
    let mut sheet = Sheet::new(ORDERS_SHEET, &ORDER_HEADERS);
    for export in orders {
        let order = &export.summary.order;
        let header = [
            order.id.to_string(),
            export
                .summary
                .customer_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
            order.status.as_str().to_string(),
            number(order.total_amount),
            number(order.paid_amount),
            number(order.outstanding()),
            order.notes.clone(),
            time::to_display_date(order.created_at),
        ];

        if export.lines.is_empty() {
            let mut row = header.to_vec();
            row.extend(std::iter::repeat_n(String::new(), 7));
            sheet.push_row(row);
            continue;
        }

        for (index, line) in export.lines.iter().enumerate() {
            let mut row = header.to_vec();
            row.extend([
                (index + 1).to_string(),
                line.product_name.clone().unwrap_or_default(),
                line.item.quantity.to_string(),
                number(line.item.unit_price),
                number(line.item.total_price),
                line.unit_cost.map(number).unwrap_or_default(),
                line.total_cost().map(number).unwrap_or_default(),
            ]);
            sheet.push_row(row);
        }
    }
    sheet
}

pub fn decode_products(sheet: &Sheet) -> Decoded<ProductDraft> {
    let mut decoded = Decoded::default();
    for record in sheet.records() {
        let draft = ProductDraft::new(
            record.get(col::NAME),
            parse_count(record.get(col::STOCK)),
            parse_number(record.get(col::COST_PRICE)),
        );
        match draft.validate() {
            Ok(()) => decoded.rows.push((record.line(), draft)),
            Err(e) => decoded.errors.push(row_error(PRODUCTS_SHEET, &record, e.to_string())),
        }
    }
    decoded
}

pub fn decode_customers(sheet: &Sheet) -> Decoded<CustomerDraft> {
    let mut decoded = Decoded::default();
    for record in sheet.records() {
        let draft = CustomerDraft {
            name: record.get(col::NAME).to_string(),
            phone: record.get(col::PHONE).to_string(),
            email: record.get(col::EMAIL).to_string(),
            address: record.get(col::ADDRESS).to_string(),
        };
        match draft.validate() {
            Ok(()) => decoded.rows.push((record.line(), draft)),
            Err(e) => decoded.errors.push(row_error(CUSTOMERS_SHEET, &record, e.to_string())),
        }
    }
    decoded
}

pub fn decode_orders(sheet: &Sheet) -> Decoded<OrderRow> {
    let mut decoded = Decoded::default();
    for record in sheet.records() {
        let external_id = record.get(col::ORDER_ID);
        if external_id.is_empty() {
            decoded
                .errors
                .push(row_error(ORDERS_SHEET, &record, "order id is required".to_string()));
            continue;
        }

        let product_name = record.get(col::PRODUCT);
        let quantity = parse_count(record.get(col::QUANTITY));
        let item = (!product_name.is_empty() && quantity != 0).then(|| ItemCells {
            product_name: product_name.to_string(),
            quantity,
            unit_price: parse_number(record.get(col::UNIT_PRICE)),
            total_price: parse_number(record.get(col::ITEM_TOTAL)),
        });

        let customer_name = match record.get(col::CUSTOMER) {
            UNKNOWN_CUSTOMER => "",
            name => name,
        };

        decoded.rows.push((
            record.line(),
            OrderRow {
                external_id: external_id.to_string(),
                customer_name: customer_name.to_string(),
                status: OrderStatus::parse(record.get(col::STATUS)),
                notes: record.get(col::NOTES).to_string(),
                total_amount: parse_number(record.get(col::ORDER_TOTAL)),
                paid_amount: parse_number(record.get(col::PAID)),
                item,
            },
        ));
    }
    decoded
}

fn row_error(sheet: &'static str, record: &Record<'_>, reason: String) -> RowError {
    tracing::debug!(sheet, line = record.line(), %reason, "row skipped");
    RowError {
        sheet,
        line: record.line(),
        reason,
    }
}

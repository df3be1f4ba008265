//! Row → record decoding.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use shopledger_core::{
    Customer, CustomerId, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product,
    ProductId, time,
};

use crate::error::StoreResult;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, quantity, cost_price, created_at, updated_at";
pub(crate) const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, address, created_at, updated_at";
pub(crate) const ORDER_COLUMNS: &str =
    "id, customer_id, status, notes, total_amount, paid_amount, created_at, updated_at";
pub(crate) const ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, total_price";

fn timestamp(row: &SqliteRow, column: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    Ok(time::from_storage(&raw)?)
}

pub(crate) fn product(row: &SqliteRow) -> StoreResult<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        cost_price: row.try_get("cost_price")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn customer(row: &SqliteRow) -> StoreResult<Customer> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn order(row: &SqliteRow) -> StoreResult<Order> {
    let customer_id: Option<i64> = row.try_get("customer_id")?;
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        customer_id: customer_id.map(CustomerId::new),
        status: OrderStatus::parse(&status),
        notes: row.try_get("notes")?,
        total_amount: row.try_get("total_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn order_item(row: &SqliteRow) -> StoreResult<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        total_price: row.try_get("total_price")?,
    })
}

/// Prefix every column of a column list with a table alias.
pub(crate) fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

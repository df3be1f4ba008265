//! Order lifecycle.
//!
//! Multi-step writes (item replacement, order deletion, combined edits) run
//! as one transaction: either every statement lands or none does. Status is
//! a free-form label; any status may follow any other.

use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqliteConnection};

use shopledger_core::{
    CustomerId, DomainError, NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatus,
    time,
};

use crate::error::{StoreError, StoreResult};
use crate::row::{self, ITEM_COLUMNS, ORDER_COLUMNS, qualified};
use crate::store::Store;

/// What happens when a write leaves `paid_amount` above `total_amount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Accept and log a warning. Outstanding reads negative until fixed.
    #[default]
    Allow,
    /// Refuse the write with a conflict error.
    Reject,
}

impl OverpaymentPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Reject => "reject",
        }
    }

    fn check(&self, order: impl std::fmt::Display, total: f64, paid: f64) -> StoreResult<()> {
        if paid <= total {
            return Ok(());
        }
        match self {
            Self::Allow => {
                tracing::warn!(order = %order, total, paid, "order overpaid");
                Ok(())
            }
            Self::Reject => Err(DomainError::conflict(format!(
                "order {order}: paid amount {paid} exceeds total {total}"
            ))
            .into()),
        }
    }
}

/// A combined edit applied by [`Ledger::save_order`]. `None` leaves the
/// field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderChanges {
    pub customer_id: Option<Option<CustomerId>>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
    pub paid_amount: Option<f64>,
    /// Explicit total. When absent and `items` is given, the total becomes
    /// the sum of the new item totals.
    pub total_amount: Option<f64>,
    pub items: Option<Vec<NewOrderItem>>,
}

/// An order as listed: header plus joined customer name and item count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order: Order,
    /// `None` when the order has no customer or the customer was removed.
    pub customer_name: Option<String>,
    pub item_count: i64,
}

/// An order item with the product it points at, if it still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineView {
    pub item: OrderItem,
    pub product_name: Option<String>,
    /// Current product cost; there is no historical cost.
    pub unit_cost: Option<f64>,
}

impl OrderLineView {
    pub fn total_cost(&self) -> Option<f64> {
        self.unit_cost.map(|c| c * self.item.quantity as f64)
    }
}

/// Order and order item operations over an injected [`Store`].
#[derive(Debug, Clone)]
pub struct Ledger {
    store: Store,
    policy: OverpaymentPolicy,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            policy: OverpaymentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverpaymentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OverpaymentPolicy {
        self.policy
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// New order with a zero total; the total is set once items are known.
    pub async fn create_order(&self, new: &NewOrder) -> StoreResult<Order> {
        let mut conn = self.store.pool().acquire().await?;
        insert_order(&mut *conn, new, 0.0).await
    }

    /// New order carrying a known total, as when records come from an
    /// external file. Subject to the overpayment policy.
    pub async fn record_order(&self, new: &NewOrder, total_amount: f64) -> StoreResult<Order> {
        ensure_amount("total amount", total_amount)?;
        self.policy.check("(new)", total_amount, new.paid_amount)?;
        let mut conn = self.store.pool().acquire().await?;
        insert_order(&mut *conn, new, total_amount).await
    }

    pub async fn get_order(&self, id: OrderId) -> StoreResult<Order> {
        let mut conn = self.store.pool().acquire().await?;
        fetch_order(&mut *conn, id).await
    }

    /// Delete every item of the order, then insert `items`. One transaction.
    pub async fn replace_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> StoreResult<Vec<OrderItem>> {
        items.iter().try_for_each(NewOrderItem::validate)?;

        let mut tx = self.store.begin().await?;
        fetch_order(&mut *tx, order_id).await?;
        let inserted = replace_items_in(&mut *tx, order_id, items).await?;
        touch(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::debug!(order_id = %order_id, items = inserted.len(), "order items replaced");
        Ok(inserted)
    }

    /// Append one item without touching the others or the total.
    pub async fn add_item(&self, order_id: OrderId, item: &NewOrderItem) -> StoreResult<OrderItem> {
        item.validate()?;
        let mut tx = self.store.begin().await?;
        fetch_order(&mut *tx, order_id).await?;
        let inserted = insert_item(&mut *tx, order_id, item).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn set_total_amount(&self, id: OrderId, total: f64) -> StoreResult<()> {
        ensure_amount("total amount", total)?;
        let mut tx = self.store.begin().await?;
        let order = fetch_order(&mut *tx, id).await?;
        self.policy.check(id, total, order.paid_amount)?;
        update_field(&mut *tx, id, "total_amount", total).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_paid_amount(&self, id: OrderId, paid: f64) -> StoreResult<()> {
        ensure_amount("paid amount", paid)?;
        let mut tx = self.store.begin().await?;
        let order = fetch_order(&mut *tx, id).await?;
        self.policy.check(id, order.total_amount, paid)?;
        update_field(&mut *tx, id, "paid_amount", paid).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_status(&self, id: OrderId, status: &OrderStatus) -> StoreResult<()> {
        let mut conn = self.store.pool().acquire().await?;
        update_field(&mut *conn, id, "status", status.as_str().to_string()).await
    }

    /// Apply a combined edit in one transaction and return the saved order.
    pub async fn save_order(&self, id: OrderId, changes: OrderChanges) -> StoreResult<Order> {
        if let Some(paid) = changes.paid_amount {
            ensure_amount("paid amount", paid)?;
        }
        if let Some(total) = changes.total_amount {
            ensure_amount("total amount", total)?;
        }
        if let Some(items) = &changes.items {
            items.iter().try_for_each(NewOrderItem::validate)?;
        }

        let mut tx = self.store.begin().await?;
        let current = fetch_order(&mut *tx, id).await?;

        let total = match (&changes.total_amount, &changes.items) {
            (Some(total), _) => *total,
            (None, Some(items)) => items.iter().fold(0.0, |acc, i| acc + i.total_price),
            (None, None) => current.total_amount,
        };
        let paid = changes.paid_amount.unwrap_or(current.paid_amount);
        self.policy.check(id, total, paid)?;

        if let Some(items) = &changes.items {
            replace_items_in(&mut *tx, id, items).await?;
        }

        let customer_id = changes.customer_id.unwrap_or(current.customer_id);
        let status = changes.status.unwrap_or(current.status);
        let notes = changes.notes.unwrap_or(current.notes);

        let sql = format!(
            "UPDATE orders SET customer_id = ?1, status = ?2, notes = ?3, total_amount = ?4, \
             paid_amount = ?5, updated_at = ?6 WHERE id = ?7 RETURNING {ORDER_COLUMNS}"
        );
        let saved = sqlx::query(&sql)
            .bind(customer_id.map(CustomerId::get))
            .bind(status.as_str())
            .bind(notes.trim())
            .bind(total)
            .bind(paid)
            .bind(time::now_storage())
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await?;
        let saved = row::order(&saved)?;
        tx.commit().await?;

        tracing::debug!(order_id = %id, total, paid, "order saved");
        Ok(saved)
    }

    /// Delete the order's items, then the order. One transaction.
    ///
    /// Returns how many items were removed.
    pub async fn delete_order(&self, id: OrderId) -> StoreResult<u64> {
        let mut tx = self.store.begin().await?;
        let items = sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let orders = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if orders == 0 {
            return Err(StoreError::not_found("order", id));
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, items, "order deleted");
        Ok(items)
    }

    /// Every order, newest first.
    pub async fn list_orders(&self) -> StoreResult<Vec<OrderSummary>> {
        let sql = format!(
            "SELECT {}, c.name AS customer_name, \
                    (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS item_count \
             FROM orders o LEFT JOIN customers c ON c.id = o.customer_id \
             ORDER BY o.created_at DESC, o.id DESC",
            qualified(ORDER_COLUMNS, "o")
        );
        let rows = sqlx::query(&sql).fetch_all(self.store.pool()).await?;
        rows.iter()
            .map(|r| -> StoreResult<OrderSummary> {
                Ok(OrderSummary {
                    order: row::order(r)?,
                    customer_name: r.try_get("customer_name")?,
                    item_count: r.try_get("item_count")?,
                })
            })
            .collect()
    }

    /// Items of one order with their product name and current cost.
    pub async fn items_for_order(&self, order_id: OrderId) -> StoreResult<Vec<OrderLineView>> {
        let sql = format!(
            "SELECT {}, p.name AS product_name, p.cost_price AS unit_cost \
             FROM order_items i LEFT JOIN products p ON p.id = i.product_id \
             WHERE i.order_id = ?1 ORDER BY i.id",
            qualified(ITEM_COLUMNS, "i")
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_all(self.store.pool())
            .await?;
        rows.iter()
            .map(|r| -> StoreResult<OrderLineView> {
                Ok(OrderLineView {
                    item: row::order_item(r)?,
                    product_name: r.try_get("product_name")?,
                    unit_cost: r.try_get("unit_cost")?,
                })
            })
            .collect()
    }

    /// Every order item in the store.
    pub async fn list_items(&self) -> StoreResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items ORDER BY order_id, id");
        let rows = sqlx::query(&sql).fetch_all(self.store.pool()).await?;
        rows.iter().map(row::order_item).collect()
    }
}

fn ensure_amount(what: &str, value: f64) -> StoreResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!("{what} must be a non-negative number")).into());
    }
    Ok(())
}

async fn insert_order(
    conn: &mut SqliteConnection,
    new: &NewOrder,
    total_amount: f64,
) -> StoreResult<Order> {
    new.validate()?;
    let sql = format!(
        "INSERT INTO orders (customer_id, status, notes, total_amount, paid_amount, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) RETURNING {ORDER_COLUMNS}"
    );
    let inserted = sqlx::query(&sql)
        .bind(new.customer_id.map(CustomerId::get))
        .bind(new.status.as_str())
        .bind(new.notes.trim())
        .bind(total_amount)
        .bind(new.paid_amount)
        .bind(time::now_storage())
        .fetch_one(&mut *conn)
        .await?;
    let order = row::order(&inserted)?;
    tracing::debug!(order_id = %order.id, status = %order.status, "order created");
    Ok(order)
}

async fn fetch_order(conn: &mut SqliteConnection, id: OrderId) -> StoreResult<Order> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    match sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
    {
        Some(r) => row::order(&r),
        None => Err(StoreError::not_found("order", id)),
    }
}

async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    item: &NewOrderItem,
) -> StoreResult<OrderItem> {
    let sql = format!(
        "INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {ITEM_COLUMNS}"
    );
    let inserted = sqlx::query(&sql)
        .bind(order_id.get())
        .bind(item.product_id.get())
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(time::now_storage())
        .fetch_one(&mut *conn)
        .await?;
    row::order_item(&inserted)
}

async fn replace_items_in(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> StoreResult<Vec<OrderItem>> {
    sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
        .bind(order_id.get())
        .execute(&mut *conn)
        .await?;
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        inserted.push(insert_item(conn, order_id, item).await?);
    }
    Ok(inserted)
}

async fn touch(conn: &mut SqliteConnection, id: OrderId) -> StoreResult<()> {
    sqlx::query("UPDATE orders SET updated_at = ?1 WHERE id = ?2")
        .bind(time::now_storage())
        .bind(id.get())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Single-column update; `column` is always one of the fixed names above.
async fn update_field<T>(
    conn: &mut SqliteConnection,
    id: OrderId,
    column: &'static str,
    value: T,
) -> StoreResult<()>
where
    T: for<'e> sqlx::Encode<'e, Sqlite> + sqlx::Type<Sqlite> + Send + 'static,
{
    let sql = format!("UPDATE orders SET {column} = ?1, updated_at = ?2 WHERE id = ?3");
    let updated = sqlx::query(&sql)
        .bind(value)
        .bind(time::now_storage())
        .bind(id.get())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(StoreError::not_found("order", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use shopledger_core::{CustomerDraft, ProductDraft, ProductId};

    use super::*;
    use crate::catalog::Catalog;
    use crate::customers::Customers;
    use crate::schema::SchemaStore;

    async fn migrated() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        SchemaStore::new(store.clone()).ensure_schema().await.unwrap();
        store
    }

    fn line(product: i64, quantity: i64, unit_price: f64) -> NewOrderItem {
        NewOrderItem::priced(ProductId::new(product), quantity, unit_price)
    }

    #[tokio::test]
    async fn created_order_starts_with_zero_total() {
        let ledger = Ledger::new(migrated().await);

        let order = ledger
            .create_order(&NewOrder {
                notes: "presente".into(),
                paid_amount: 20.0,
                ..NewOrder::default()
            })
            .await
            .unwrap();

        assert_eq!(order.total_amount, 0.0);
        assert_eq!(order.paid_amount, 20.0);
        assert_eq!(order.status, OrderStatus::WithCustomer);
        assert_eq!(ledger.get_order(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn replace_items_swaps_the_whole_set() {
        let ledger = Ledger::new(migrated().await);
        let order = ledger.create_order(&NewOrder::default()).await.unwrap();
        ledger
            .replace_items(order.id, &[line(1, 1, 10.0), line(2, 1, 5.0)])
            .await
            .unwrap();

        let replaced = ledger.replace_items(order.id, &[line(3, 2, 7.5)]).await.unwrap();

        assert_eq!(replaced.len(), 1);
        let items = ledger.items_for_order(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.product_id, ProductId::new(3));
        assert_eq!(items[0].item.total_price, 15.0);
    }

    #[tokio::test]
    async fn invalid_item_leaves_existing_items_in_place() {
        let ledger = Ledger::new(migrated().await);
        let order = ledger.create_order(&NewOrder::default()).await.unwrap();
        ledger.replace_items(order.id, &[line(1, 1, 10.0)]).await.unwrap();

        let err = ledger
            .replace_items(order.id, &[line(2, 1, 3.0), line(3, 0, 3.0)])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Domain(_)));
        assert_eq!(ledger.list_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn single_field_updates_are_independent() {
        let ledger = Ledger::new(migrated().await);
        let order = ledger.create_order(&NewOrder::default()).await.unwrap();

        ledger.set_total_amount(order.id, 120.0).await.unwrap();
        ledger.set_paid_amount(order.id, 50.0).await.unwrap();
        ledger.set_status(order.id, &OrderStatus::Order).await.unwrap();
        ledger.set_status(order.id, &OrderStatus::WithCustomer).await.unwrap();

        let saved = ledger.get_order(order.id).await.unwrap();
        assert_eq!(saved.total_amount, 120.0);
        assert_eq!(saved.paid_amount, 50.0);
        assert_eq!(saved.status, OrderStatus::WithCustomer);
        assert_eq!(saved.outstanding_clamped(), 70.0);
    }

    #[tokio::test]
    async fn updates_on_missing_order_are_not_found() {
        let ledger = Ledger::new(migrated().await);
        let missing = OrderId::new(77);

        assert!(ledger.set_status(missing, &OrderStatus::Paid).await.unwrap_err().is_not_found());
        assert!(ledger.set_paid_amount(missing, 1.0).await.unwrap_err().is_not_found());
        assert!(ledger.delete_order(missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn save_order_recomputes_total_from_items() {
        let ledger = Ledger::new(migrated().await);
        let order = ledger.create_order(&NewOrder::default()).await.unwrap();

        let saved = ledger
            .save_order(
                order.id,
                OrderChanges {
                    status: Some(OrderStatus::Paid),
                    paid_amount: Some(40.0),
                    items: Some(vec![line(1, 2, 12.5), line(2, 1, 15.0)]),
                    ..OrderChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.total_amount, 40.0);
        assert_eq!(saved.status, OrderStatus::Paid);
        assert_eq!(ledger.items_for_order(order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overpayment_follows_policy() {
        let store = migrated().await;
        let lenient = Ledger::new(store.clone());
        let strict = Ledger::new(store).with_policy(OverpaymentPolicy::Reject);
        let order = lenient.create_order(&NewOrder::default()).await.unwrap();
        lenient.set_total_amount(order.id, 50.0).await.unwrap();

        let err = strict.set_paid_amount(order.id, 80.0).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
        assert_eq!(strict.get_order(order.id).await.unwrap().paid_amount, 0.0);

        lenient.set_paid_amount(order.id, 80.0).await.unwrap();
        let overpaid = lenient.get_order(order.id).await.unwrap();
        assert_eq!(overpaid.outstanding(), -30.0);
        assert_eq!(overpaid.outstanding_clamped(), 0.0);
    }

    #[tokio::test]
    async fn delete_order_removes_items_first() {
        let ledger = Ledger::new(migrated().await);
        let keep = ledger.create_order(&NewOrder::default()).await.unwrap();
        let gone = ledger.create_order(&NewOrder::default()).await.unwrap();
        ledger.replace_items(keep.id, &[line(1, 1, 1.0)]).await.unwrap();
        ledger
            .replace_items(gone.id, &[line(1, 1, 1.0), line(2, 1, 1.0)])
            .await
            .unwrap();

        assert_eq!(ledger.delete_order(gone.id).await.unwrap(), 2);

        let items = ledger.list_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].order_id, keep.id);
        assert!(ledger.get_order(gone.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn listing_joins_customer_and_product() {
        let store = migrated().await;
        let ana = Customers::new(store.clone())
            .create(&CustomerDraft::named("Ana"))
            .await
            .unwrap();
        let body = Catalog::new(store.clone())
            .create(&ProductDraft::new("Body", 3, 30.0))
            .await
            .unwrap();
        let ledger = Ledger::new(store);
        let first = ledger
            .create_order(&NewOrder {
                customer_id: Some(ana.id),
                ..NewOrder::default()
            })
            .await
            .unwrap();
        let second = ledger.create_order(&NewOrder::default()).await.unwrap();
        ledger
            .replace_items(first.id, &[NewOrderItem::priced(body.id, 2, 80.0), line(99, 1, 5.0)])
            .await
            .unwrap();

        let listed = ledger.list_orders().await.unwrap();
        assert_eq!(listed[0].order.id, second.id);
        assert_eq!(listed[0].customer_name, None);
        assert_eq!(listed[1].customer_name.as_deref(), Some("Ana"));
        assert_eq!(listed[1].item_count, 2);

        let lines = ledger.items_for_order(first.id).await.unwrap();
        assert_eq!(lines[0].product_name.as_deref(), Some("Body"));
        assert_eq!(lines[0].total_cost(), Some(60.0));
        assert_eq!(lines[1].product_name, None);
        assert_eq!(lines[1].total_cost(), None);
    }

    #[test]
    fn policy_parses_from_config_text() {
        assert_eq!(OverpaymentPolicy::parse(" Reject "), Some(OverpaymentPolicy::Reject));
        assert_eq!(OverpaymentPolicy::parse("allow"), Some(OverpaymentPolicy::Allow));
        assert_eq!(OverpaymentPolicy::parse("maybe"), None);
    }
}

//! Reference checks consulted before destructive deletes.
//!
//! The store has no foreign keys. These queries are the only thing standing
//! between a delete and a dangling `order_items.product_id` or
//! `orders.customer_id`; callers that skip them are not stopped.

use sqlx::SqliteConnection;

use shopledger_core::{CustomerId, ProductId};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Read-only reference checks.
#[derive(Debug, Clone)]
pub struct IntegrityGuard {
    store: Store,
}

impl IntegrityGuard {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Whether any order item points at the product.
    pub async fn is_product_referenced(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.product_references(id).await? > 0)
    }

    /// Whether any order points at the customer.
    pub async fn is_customer_referenced(&self, id: CustomerId) -> StoreResult<bool> {
        Ok(self.customer_references(id).await? > 0)
    }

    pub async fn product_references(&self, id: ProductId) -> StoreResult<i64> {
        let mut conn = self.store.pool().acquire().await?;
        product_references(&mut *conn, id).await
    }

    pub async fn customer_references(&self, id: CustomerId) -> StoreResult<i64> {
        let mut conn = self.store.pool().acquire().await?;
        customer_references(&mut *conn, id).await
    }
}

pub(crate) async fn product_references(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> StoreResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE product_id = ?1")
            .bind(id.get())
            .fetch_one(&mut *conn)
            .await?,
    )
}

pub(crate) async fn customer_references(
    conn: &mut SqliteConnection,
    id: CustomerId,
) -> StoreResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = ?1")
            .bind(id.get())
            .fetch_one(&mut *conn)
            .await?,
    )
}

/// Refuse with [`StoreError::InUse`] when the product is referenced.
pub(crate) async fn ensure_product_unreferenced(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> StoreResult<()> {
    match product_references(conn, id).await? {
        0 => Ok(()),
        references => Err(StoreError::InUse {
            entity: "product",
            id: id.get(),
            referenced_by: "order item",
            references,
        }),
    }
}

/// Refuse with [`StoreError::InUse`] when the customer is referenced.
pub(crate) async fn ensure_customer_unreferenced(
    conn: &mut SqliteConnection,
    id: CustomerId,
) -> StoreResult<()> {
    match customer_references(conn, id).await? {
        0 => Ok(()),
        references => Err(StoreError::InUse {
            entity: "customer",
            id: id.get(),
            referenced_by: "order",
            references,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaStore;

    async fn migrated() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        SchemaStore::new(store.clone()).ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn unreferenced_records_are_free() {
        let store = migrated().await;
        let guard = IntegrityGuard::new(store);

        assert!(!guard.is_product_referenced(ProductId::new(1)).await.unwrap());
        assert!(!guard.is_customer_referenced(CustomerId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn references_are_counted_per_row() {
        let store = migrated().await;
        sqlx::query(
            "INSERT INTO orders (customer_id) VALUES (7); \
             INSERT INTO order_items (order_id, product_id, quantity) VALUES (1, 3, 1), (1, 3, 2)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        let guard = IntegrityGuard::new(store.clone());

        assert!(guard.is_customer_referenced(CustomerId::new(7)).await.unwrap());
        assert_eq!(guard.product_references(ProductId::new(3)).await.unwrap(), 2);

        let mut conn = store.pool().acquire().await.unwrap();
        let err = ensure_product_unreferenced(&mut *conn, ProductId::new(3))
            .await
            .unwrap_err();
        assert!(err.is_in_use());
        assert!(
            ensure_customer_unreferenced(&mut *conn, CustomerId::new(8))
                .await
                .is_ok()
        );
    }
}

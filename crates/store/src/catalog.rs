//! Product records.

use sqlx::SqliteConnection;

use shopledger_core::{Product, ProductDraft, ProductId, time};

use crate::error::{StoreError, StoreResult};
use crate::guard::ensure_product_unreferenced;
use crate::row::{self, PRODUCT_COLUMNS};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: &ProductDraft) -> StoreResult<Product> {
        let mut conn = self.store.pool().acquire().await?;
        insert_product(&mut *conn, draft).await
    }

    pub async fn get(&self, id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let found = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(self.store.pool())
            .await?;
        match found {
            Some(r) => row::product(&r),
            None => Err(StoreError::not_found("product", id)),
        }
    }

    /// All products, alphabetical; duplicates by name in creation order.
    pub async fn list(&self) -> StoreResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, id");
        let rows = sqlx::query(&sql).fetch_all(self.store.pool()).await?;
        rows.iter().map(row::product).collect()
    }

    pub async fn update(&self, id: ProductId, draft: &ProductDraft) -> StoreResult<Product> {
        draft.validate()?;
        let sql = format!(
            "UPDATE products SET name = ?1, quantity = ?2, cost_price = ?3, updated_at = ?4 \
             WHERE id = ?5 RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(draft.name.trim())
            .bind(draft.quantity)
            .bind(draft.cost_price)
            .bind(time::now_storage())
            .bind(id.get())
            .fetch_optional(self.store.pool())
            .await?;
        match updated {
            Some(r) => row::product(&r),
            None => Err(StoreError::not_found("product", id)),
        }
    }

    /// Add `delta` (negative to take out) to the stock on hand.
    pub async fn adjust_stock(&self, id: ProductId, delta: i64) -> StoreResult<Product> {
        let sql = format!(
            "UPDATE products SET quantity = quantity + ?1, updated_at = ?2 \
             WHERE id = ?3 RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(delta)
            .bind(time::now_storage())
            .bind(id.get())
            .fetch_optional(self.store.pool())
            .await?;
        match updated {
            Some(r) => {
                let product = row::product(&r)?;
                if product.quantity < 0 {
                    tracing::warn!(product_id = %id, quantity = product.quantity, "stock went negative");
                }
                Ok(product)
            }
            None => Err(StoreError::not_found("product", id)),
        }
    }

    /// Delete a product no order item references.
    ///
    /// Refuses with [`StoreError::InUse`] otherwise. Check and delete share
    /// one transaction.
    pub async fn delete(&self, id: ProductId) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;
        ensure_product_unreferenced(&mut *tx, id).await?;
        let deleted = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::not_found("product", id));
        }
        tx.commit().await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

pub(crate) async fn insert_product(
    conn: &mut SqliteConnection,
    draft: &ProductDraft,
) -> StoreResult<Product> {
    draft.validate()?;
    let now = time::now_storage();
    let sql = format!(
        "INSERT INTO products (name, quantity, cost_price, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {PRODUCT_COLUMNS}"
    );
    let inserted = sqlx::query(&sql)
        .bind(draft.name.trim())
        .bind(draft.quantity)
        .bind(draft.cost_price)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    let product = row::product(&inserted)?;
    tracing::debug!(product_id = %product.id, name = %product.name, "product created");
    Ok(product)
}

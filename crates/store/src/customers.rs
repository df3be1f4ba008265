//! Customer records.

use sqlx::SqliteConnection;

use shopledger_core::{Customer, CustomerDraft, CustomerId, time};

use crate::error::{StoreError, StoreResult};
use crate::guard::ensure_customer_unreferenced;
use crate::row::{self, CUSTOMER_COLUMNS};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Customers {
    store: Store,
}

impl Customers {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: &CustomerDraft) -> StoreResult<Customer> {
        let mut conn = self.store.pool().acquire().await?;
        insert_customer(&mut *conn, draft).await
    }

    pub async fn get(&self, id: CustomerId) -> StoreResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(self.store.pool())
            .await?
            .map(|r| row::customer(&r))
            .unwrap_or_else(|| Err(StoreError::not_found("customer", id)))
    }

    pub async fn list(&self) -> StoreResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, id");
        let rows = sqlx::query(&sql).fetch_all(self.store.pool()).await?;
        rows.iter().map(row::customer).collect()
    }

    pub async fn update(&self, id: CustomerId, draft: &CustomerDraft) -> StoreResult<Customer> {
        draft.validate()?;
        let sql = format!(
            "UPDATE customers SET name = ?1, phone = ?2, email = ?3, address = ?4, updated_at = ?5 \
             WHERE id = ?6 RETURNING {CUSTOMER_COLUMNS}"
        );
        sqlx::query(&sql)
            .bind(draft.name.trim())
            .bind(draft.phone.trim())
            .bind(draft.email.trim())
            .bind(draft.address.trim())
            .bind(time::now_storage())
            .bind(id.get())
            .fetch_optional(self.store.pool())
            .await?
            .map(|r| row::customer(&r))
            .unwrap_or_else(|| Err(StoreError::not_found("customer", id)))
    }

    /// Delete a customer no order references; refuses with
    /// [`StoreError::InUse`] otherwise.
    pub async fn delete(&self, id: CustomerId) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;
        ensure_customer_unreferenced(&mut *tx, id).await?;
        let deleted = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::not_found("customer", id));
        }
        tx.commit().await?;
        tracing::info!(customer_id = %id, "customer deleted");
        Ok(())
    }
}

pub(crate) async fn insert_customer(
    conn: &mut SqliteConnection,
    draft: &CustomerDraft,
) -> StoreResult<Customer> {
    draft.validate()?;
    let sql = format!(
        "INSERT INTO customers (name, phone, email, address, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {CUSTOMER_COLUMNS}"
    );
    let inserted = sqlx::query(&sql)
        .bind(draft.name.trim())
        .bind(draft.phone.trim())
        .bind(draft.email.trim())
        .bind(draft.address.trim())
        .bind(time::now_storage())
        .fetch_one(&mut *conn)
        .await?;
    let customer = row::customer(&inserted)?;
    tracing::debug!(customer_id = %customer.id, name = %customer.name, "customer created");
    Ok(customer)
}

//! Schema evolution: bring a populated store of any previously shipped shape
//! to the canonical shape without losing rows.

mod migrations;
mod rebuild;
pub mod tables;

use std::collections::BTreeSet;

use serde::Serialize;

use shopledger_core::time;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

pub use migrations::{MIGRATIONS, Migration, Step, latest_version};
pub use rebuild::{TableAction, TableDrift};
pub use tables::{CANONICAL, ColumnDef, ColumnKind, TableDef};

use migrations::{MARKER_TABLE_SQL, StepOutcome, apply_step};
use rebuild::{reconcile_table, table_columns};
use tables::CANONICAL_INDEXES;

/// What one `ensure_schema` run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// Migration versions applied by this run, in order.
    pub applied: Vec<i64>,
    /// Per-table action for every table a migration or repair touched.
    pub tables: Vec<(&'static str, TableAction)>,
    /// Legacy single-product orders turned into line items.
    pub lifted_order_lines: u64,
    /// Tables found out of shape after all migrations were recorded.
    pub repaired: Vec<TableDrift>,
}

impl SchemaReport {
    /// Nothing was created, rebuilt, recovered or applied.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
            && self.repaired.is_empty()
            && self.lifted_order_lines == 0
            && self
                .tables
                .iter()
                .all(|(_, action)| *action == TableAction::Unchanged)
    }

    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Table { table, action } => self.tables.push((table, action)),
            StepOutcome::LiftedLines(n) => self.lifted_order_lines += n,
            StepOutcome::Executed => {}
        }
    }
}

/// Owner of the table definitions.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    store: Store,
}

impl SchemaStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Apply every pending migration, then repair any canonical table whose
    /// column set drifted. A second run on a migrated store changes nothing.
    ///
    /// Each migration runs in its own transaction; a failing step rolls that
    /// migration back and is reported as [`StoreError::Migration`].
    pub async fn ensure_schema(&self) -> StoreResult<SchemaReport> {
        let pool = self.store.pool();
        sqlx::query(MARKER_TABLE_SQL).execute(pool).await?;

        let applied = self.applied_versions().await?;
        let mut report = SchemaReport::default();

        for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
            self.apply_migration(migration, &mut report).await?;
        }

        let drifted: Vec<(&'static TableDef, TableDrift)> = CANONICAL
            .iter()
            .zip(self.verify().await?)
            .filter(|(_, drift)| !drift.is_clean())
            .collect();

        if !drifted.is_empty() {
            let mut tx = self.store.begin().await?;
            for (def, drift) in &drifted {
                tracing::warn!(
                    table = drift.table,
                    absent = drift.absent,
                    missing = ?drift.missing,
                    extra = ?drift.extra,
                    "table out of canonical shape after migrations; repairing"
                );
                let action = reconcile_table(&mut *tx, def).await?;
                report.tables.push((def.name, action));
            }
            // Rebuilt tables lose their indexes.
            for sql in CANONICAL_INDEXES {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            report.repaired = drifted.into_iter().map(|(_, drift)| drift).collect();
        }

        if report.is_noop() {
            tracing::debug!("schema already canonical");
        } else {
            tracing::info!(
                applied = ?report.applied,
                repaired = report.repaired.len(),
                lifted_order_lines = report.lifted_order_lines,
                "schema brought to canonical shape"
            );
        }

        Ok(report)
    }

    async fn apply_migration(
        &self,
        migration: &Migration,
        report: &mut SchemaReport,
    ) -> StoreResult<()> {
        let fail = |step: &Step, source: sqlx::Error| StoreError::Migration {
            version: migration.version,
            name: migration.name,
            step: step.describe(),
            source,
        };

        let mut tx = self.store.begin().await?;
        for step in migration.steps {
            let outcome = apply_step(&mut *tx, step)
                .await
                .map_err(|e| fail(step, e))?;
            report.record(outcome);
        }

        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(time::now_storage())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        report.applied.push(migration.version);
        tracing::info!(version = migration.version, name = migration.name, "migration applied");
        Ok(())
    }

    /// Compare every canonical table with its live shape. Read-only.
    pub async fn verify(&self) -> StoreResult<Vec<TableDrift>> {
        let mut conn = self.store.pool().acquire().await?;
        let mut drift = Vec::with_capacity(CANONICAL.len());
        for def in CANONICAL.iter() {
            let live = table_columns(&mut *conn, def.name).await?;
            drift.push(TableDrift::between(def, &live));
        }
        Ok(drift)
    }

    /// Live column names of a table, in declaration order.
    pub async fn columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.store.pool().acquire().await?;
        Ok(table_columns(&mut *conn, table).await?)
    }

    /// Highest recorded migration version, `None` before the first run.
    pub async fn current_version(&self) -> StoreResult<Option<i64>> {
        Ok(self.applied_versions().await?.into_iter().next_back())
    }

    async fn applied_versions(&self) -> StoreResult<BTreeSet<i64>> {
        let pool = self.store.pool();
        sqlx::query(MARKER_TABLE_SQL).execute(pool).await?;
        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
            .fetch_all(pool)
            .await?;
        Ok(versions.into_iter().collect())
    }
}

//! Introspection and the shadow-table rebuild.
//!
//! Every function re-reads the live shape before acting, so a sequence cut
//! short by a crash is picked up from wherever it stopped on the next run.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::SqliteConnection;

use super::tables::TableDef;

/// Difference between a live table and its canonical shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDrift {
    pub table: &'static str,
    /// The table does not exist at all.
    pub absent: bool,
    /// Canonical columns the live table lacks.
    pub missing: Vec<String>,
    /// Live columns the canonical shape no longer has.
    pub extra: Vec<String>,
}

impl TableDrift {
    pub fn between(def: &TableDef, live: &[String]) -> Self {
        let live_set: BTreeSet<String> = live.iter().map(|c| c.to_ascii_lowercase()).collect();
        Self {
            table: def.name,
            absent: live.is_empty(),
            missing: def
                .column_names()
                .filter(|c| !live_set.contains(&c.to_ascii_lowercase()))
                .map(str::to_string)
                .collect(),
            extra: live
                .iter()
                .filter(|c| !def.has_column(c))
                .cloned()
                .collect(),
        }
    }

    /// The live table has exactly the canonical column set.
    pub fn is_clean(&self) -> bool {
        !self.absent && self.missing.is_empty() && self.extra.is_empty()
    }
}

/// What reconciling one table did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableAction {
    Unchanged,
    Created,
    /// A finished shadow copy was renamed into place.
    Recovered,
    Rebuilt { drift: TableDrift },
}

/// Column names of `table` in declaration order; empty when the table is absent.
pub(crate) async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .bind(table)
        .fetch_all(&mut *conn)
        .await
}

pub(crate) async fn table_exists(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await
}

/// Bring one table to its canonical shape.
///
/// - absent, shadow present: a previous rebuild dropped the original but
///   never renamed the copy; rename it and re-check.
/// - absent: create.
/// - column set differs: shadow rebuild.
pub(crate) async fn reconcile_table(
    conn: &mut SqliteConnection,
    def: &TableDef,
) -> Result<TableAction, sqlx::Error> {
    let shadow = def.shadow_name();
    let mut live = table_columns(conn, def.name).await?;
    let mut recovered = false;

    if live.is_empty() && table_exists(conn, &shadow).await? {
        tracing::warn!(table = def.name, "renaming orphaned shadow table left by an interrupted rebuild");
        sqlx::query(&format!("ALTER TABLE \"{shadow}\" RENAME TO \"{}\"", def.name))
            .execute(&mut *conn)
            .await?;
        live = table_columns(conn, def.name).await?;
        recovered = true;
    }

    if live.is_empty() {
        sqlx::query(&def.create_sql(def.name))
            .execute(&mut *conn)
            .await?;
        tracing::info!(table = def.name, "table created");
        return Ok(TableAction::Created);
    }

    let drift = TableDrift::between(def, &live);
    if drift.is_clean() {
        return Ok(if recovered {
            TableAction::Recovered
        } else {
            TableAction::Unchanged
        });
    }

    rebuild(conn, def, &live).await?;
    tracing::info!(
        table = def.name,
        missing = ?drift.missing,
        extra = ?drift.extra,
        "table rebuilt to canonical shape"
    );
    Ok(TableAction::Rebuilt { drift })
}

/// Shadow-table rebuild: create the canonical shape under a temporary name,
/// copy every row (shared columns by value, absent ones filled), drop the
/// original, rename the copy.
async fn rebuild(
    conn: &mut SqliteConnection,
    def: &TableDef,
    live: &[String],
) -> Result<(), sqlx::Error> {
    let shadow = def.shadow_name();

    let mut targets = Vec::with_capacity(def.columns.len());
    let mut sources = Vec::with_capacity(def.columns.len());
    for column in def.columns {
        if live.iter().any(|c| c.eq_ignore_ascii_case(column.name)) {
            targets.push(format!("\"{}\"", column.name));
            sources.push(column.copy_expr());
        } else if let Some(fill) = column.fill_expr() {
            targets.push(format!("\"{}\"", column.name));
            sources.push(fill.to_string());
        }
    }

    sqlx::query(&format!("DROP TABLE IF EXISTS \"{shadow}\""))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&def.create_sql(&shadow))
        .execute(&mut *conn)
        .await?;

    let copy = format!(
        "INSERT INTO \"{shadow}\" ({}) SELECT {} FROM \"{}\"",
        targets.join(", "),
        sources.join(", "),
        def.name
    );
    let copied = sqlx::query(&copy).execute(&mut *conn).await?.rows_affected();

    sqlx::query(&format!("DROP TABLE \"{}\"", def.name))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!("ALTER TABLE \"{shadow}\" RENAME TO \"{}\"", def.name))
        .execute(&mut *conn)
        .await?;

    tracing::debug!(table = def.name, rows = copied, "rows copied through shadow table");
    Ok(())
}

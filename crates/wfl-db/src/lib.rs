//! Fulfillment ledger store.
//!
//! A single wide SQLite table (`ledger`) holds one row per physical unit of
//! inventory moving through the outbound pipeline. This crate owns the
//! schema, additive column migration, ingestion (quantity explosion),
//! shelf/TL resolution, box allocation, pick/pack status writes and the
//! shelf-ordered physical reorg.
//!
//! All repository functions are free async fns over a [`SqlitePool`] and
//! return `Result<_, LedgerError>`. Insertion order is the implicit SQLite
//! `rowid`; every "earliest/latest" rule below is an explicit `ORDER BY`
//! over it.
//!
//! Concurrency model: one logical writer process. The pool is capped at a
//! single connection, so the synchronous scan path and the background
//! poller serialize at the ledger without extra locking.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

mod boxes;
mod error;
mod ingest;
mod reorg;
mod resolve;
mod rows;
mod status;

pub use boxes::{assign_box_ids_to_stns, next_unpicked_box_for_tl_shelf, AssignedBox};
pub use error::{LedgerError, Result};
pub use ingest::{insert_unit_rows, update_source_destination};
pub use reorg::sort_by_shelf_ascending;
pub use resolve::{
    distinct_shelves_sorted, first_shelf_sorted, natural_cmp, next_unpicked_shelf, tl_for_shelf,
};
pub use rows::{ItemCodes, ScrapedItem, TlStatus, UnitRow, TL_COMPLETE_SENTINEL};
pub use status::{
    all_tls_complete, box_ids_to_pack, codes_for_tl_shelf, fetch_all_rows, mark_tl_complete,
    record_pack, record_pick, stn_route_for_box, tl_for_box, tl_fully_picked, StnRoute,
};

pub const ENV_DB_URL: &str = "WFL_DATABASE_URL";

/// The ledger table name. The reorg swaps a freshly sorted table in under
/// this name, so nothing else may create objects named `ledger_sorted`.
pub const LEDGER_TABLE: &str = "ledger";

/// Connect to the ledger database at `url` (e.g. `sqlite://wfl.db` or
/// `sqlite::memory:`), creating the file if missing.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    // Single connection: the ledger has exactly one logical writer and the
    // reorg swap must never interleave with another statement stream.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;

    Ok(pool)
}

/// Connect using WFL_DATABASE_URL.
pub async fn connect_from_env() -> Result<SqlitePool> {
    let url = std::env::var(ENV_DB_URL).map_err(|_| LedgerError::Schema {
        detail: format!("missing env var {ENV_DB_URL}"),
    })?;
    connect(&url).await
}

/// Create the ledger table and its indexes if absent.
///
/// Failure here at first startup is fatal to the process; this is the only
/// schema error callers are expected to treat that way.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        create table if not exists ledger (
          owner_id       text,
          stn            text,
          tl_id          text,
          qty            integer,
          shelf          text,
          category       text,
          wid            text,
          fsn            text,
          ean            text,
          model_id       text,
          source         text,
          destination    text,
          box_id         text,
          pick           text,
          tl_status      text,
          pack           text,
          consignment_id text,
          dispatch       text
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LedgerError::Schema {
        detail: format!("create table ledger: {e}"),
    })?;

    for (name, col) in [
        ("idx_ledger_shelf", "shelf"),
        ("idx_ledger_tl", "tl_id"),
        ("idx_ledger_box", "box_id"),
        ("idx_ledger_stn", "stn"),
    ] {
        sqlx::query(&format!(
            "create index if not exists {name} on ledger({col})"
        ))
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Schema {
            detail: format!("create index {name}: {e}"),
        })?;
    }

    Ok(())
}

/// Additive migration: add `name` with SQLite type `ty` if the ledger does
/// not already have it. New columns default to NULL; existing data is
/// untouched. Returns `true` when the column was added.
///
/// Callers treat `LedgerError::Schema` from here as non-fatal and continue
/// with the column absent.
pub async fn add_column_if_missing(pool: &SqlitePool, name: &str, ty: &str) -> Result<bool> {
    if !is_sql_identifier(name) || !is_sql_identifier(ty) {
        return Err(LedgerError::Schema {
            detail: format!("invalid column spec: {name} {ty}"),
        });
    }

    if column_exists(pool, name).await? {
        return Ok(false);
    }

    sqlx::query(&format!("alter table ledger add column {name} {ty}"))
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Schema {
            detail: format!("add column {name}: {e}"),
        })?;

    tracing::info!(column = name, "ledger column added");
    Ok(true)
}

async fn column_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let cols = table_columns(pool).await?;
    Ok(cols.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
}

/// One entry of `PRAGMA table_info(ledger)`. Shared with the reorg, which
/// rebuilds the table from the live column set (migrated columns included).
#[derive(Debug, Clone)]
pub(crate) struct ColumnInfo {
    pub name: String,
    pub ty: String,
    pub notnull: bool,
    pub default: Option<String>,
    pub pk: bool,
}

pub(crate) async fn table_columns(pool: &SqlitePool) -> Result<Vec<ColumnInfo>> {
    use sqlx::Row;

    let rows = sqlx::query("pragma table_info(ledger)")
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(ColumnInfo {
            name: row.try_get("name")?,
            ty: row.try_get("type")?,
            notnull: row.try_get::<i64, _>("notnull")? != 0,
            default: row.try_get("dflt_value")?,
            pk: row.try_get::<i64, _>("pk")? != 0,
        });
    }
    Ok(out)
}

fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

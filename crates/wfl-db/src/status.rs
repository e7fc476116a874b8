//! Pick/pack status writes, TL completion, and the global pack gate.
//!
//! `record_pick` / `record_pack` are unconditional overwrites keyed by box:
//! both event paths (scan-driven and poller-driven) write the same canonical
//! message for the same observed event, so replaying a write is a no-op in
//! effect. That property, not locking, is what makes the two paths safe.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::rows::{ItemCodes, UnitRow, TL_COMPLETE_SENTINEL};

/// Match candidates for the code matcher: identifying codes of every row on
/// the TL+shelf pair.
pub async fn codes_for_tl_shelf(pool: &SqlitePool, tl: &str, shelf: &str) -> Result<Vec<ItemCodes>> {
    let rows: Vec<(Option<String>, Option<String>, Option<String>)> =
        sqlx::query_as("select fsn, ean, model_id from ledger where tl_id = ? and shelf = ?")
            .bind(tl)
            .bind(shelf)
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(fsn, ean, model_id)| ItemCodes { fsn, ean, model_id })
        .collect())
}

/// Write the canonical completion message into `pick` for every row of the
/// box. Box ids compare case-insensitively — observed ids drift in case, and
/// the expected-box guard on the scan path already folds case. Returns rows
/// touched.
pub async fn record_pick(pool: &SqlitePool, box_id: &str, canonical_msg: &str) -> Result<u64> {
    let res = sqlx::query("update ledger set pick = ? where box_id = ? collate nocase")
        .bind(canonical_msg)
        .bind(box_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// Write the canonical completion message into `pack` for every row of the
/// box. Same case-insensitive box match as [`record_pick`]. Returns rows
/// touched.
pub async fn record_pack(pool: &SqlitePool, box_id: &str, canonical_msg: &str) -> Result<u64> {
    let res = sqlx::query("update ledger set pack = ? where box_id = ? collate nocase")
        .bind(canonical_msg)
        .bind(box_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// True when the TL has at least one row and none of its rows is unpicked.
/// This is the completion gate applied before honoring a "TL complete"
/// banner.
pub async fn tl_fully_picked(pool: &SqlitePool, tl: &str) -> Result<bool> {
    let (total, unpicked): (i64, i64) = sqlx::query_as(
        r#"
        select count(*),
               ifnull(sum(case when ifnull(pick, '') = '' then 1 else 0 end), 0)
        from ledger
        where tl_id = ?
        "#,
    )
    .bind(tl)
    .fetch_one(pool)
    .await?;

    Ok(total > 0 && unpicked == 0)
}

/// Mark every row of the TL complete. Returns rows touched.
pub async fn mark_tl_complete(pool: &SqlitePool, tl: &str) -> Result<u64> {
    let res = sqlx::query("update ledger set tl_status = ? where tl_id = ?")
        .bind(TL_COMPLETE_SENTINEL)
        .bind(tl)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// The TL owning a box, if any row records it. Box id matched
/// case-insensitively like the status writes.
pub async fn tl_for_box(pool: &SqlitePool, box_id: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "select tl_id from ledger where box_id = ? collate nocase and ifnull(tl_id, '') <> '' limit 1",
    )
    .bind(box_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(tl,)| tl))
}

/// Route fields for a box's stamp request, taken from its first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StnRoute {
    pub stn: String,
    pub source: Option<String>,
    pub destination: Option<String>,
}

pub async fn stn_route_for_box(pool: &SqlitePool, box_id: &str) -> Result<Option<StnRoute>> {
    let row: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        select stn, source, destination
        from ledger
        where box_id = ? collate nocase and ifnull(stn, '') <> ''
        order by rowid asc
        limit 1
        "#,
    )
    .bind(box_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(stn, source, destination)| StnRoute {
        stn,
        source,
        destination,
    }))
}

/// Ledger-wide pack gate: packing is permitted only when no row anywhere has
/// a non-empty `tl_id` and a `tl_status` other than "TL Complete".
pub async fn all_tls_complete(pool: &SqlitePool) -> Result<bool> {
    let (pending,): (i64,) = sqlx::query_as(
        r#"
        select count(*)
        from ledger
        where ifnull(tl_id, '') <> '' and ifnull(tl_status, '') <> ?
        "#,
    )
    .bind(TL_COMPLETE_SENTINEL)
    .fetch_one(pool)
    .await?;

    Ok(pending == 0)
}

/// Distinct non-empty box ids whose owning TL is complete and whose `pack`
/// is still empty, ordered by first insertion.
pub async fn box_ids_to_pack(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        select box_id
        from ledger
        where ifnull(box_id, '') <> ''
          and ifnull(pack, '') = ''
          and ifnull(tl_status, '') = ?
        group by box_id
        order by min(rowid) asc
        "#,
    )
    .bind(TL_COMPLETE_SENTINEL)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(b,)| b).collect())
}

/// Every ledger row in physical order. Used by the reorg tests and the
/// pack-readiness report; the ledger is small enough (one warehouse
/// session) that a full scan is fine.
pub async fn fetch_all_rows(pool: &SqlitePool) -> Result<Vec<UnitRow>> {
    let rows = sqlx::query("select * from ledger order by rowid asc")
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        out.push(UnitRow::from_sqlite_row(row)?);
    }
    Ok(out)
}

//! Ingestion: explode scraped STN line items into unit rows.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::rows::ScrapedItem;

/// Write `max(qty, 1)` unit rows per scraped item, all with `qty = 1`.
///
/// The scraped `title` is stored in the `ean` column, intentionally: the
/// scraper has no EAN at ingest time, and the matcher's dash/space-stripped
/// containment tier runs against whatever this column holds.
///
/// A zero or negative quantity degrades to 1; partial input is never
/// rejected. The whole batch is one transaction. After a successful batch
/// the ledger is re-sorted by shelf; a reorg failure is logged and does not
/// undo the insert.
///
/// Returns the number of rows written.
pub async fn insert_unit_rows(
    pool: &SqlitePool,
    owner_id: &str,
    stn: &str,
    tl_id: &str,
    items: &[ScrapedItem],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written: u64 = 0;

    for item in items {
        let units = item.qty.max(1);
        for _ in 0..units {
            sqlx::query(
                r#"
                insert into ledger (owner_id, stn, tl_id, qty, shelf, category, wid, fsn, ean)
                values (?, ?, ?, 1, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(owner_id)
            .bind(stn)
            .bind(tl_id)
            .bind(&item.shelf)
            .bind(&item.category)
            .bind(&item.wid)
            .bind(&item.fsn)
            .bind(&item.title)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }
    }

    tx.commit().await?;

    tracing::info!(stn, tl_id, rows = written, "unit rows ingested");

    // Keep the ledger shelf-sorted going forward. The rows are already
    // durable; a failed reorg only costs physical order.
    if let Err(e) = crate::reorg::sort_by_shelf_ascending(pool).await {
        tracing::warn!(error = %e, "post-ingest reorg failed; ledger order unchanged");
    }

    Ok(written)
}

/// Upsert the route endpoints for an STN: update every row of the STN if any
/// exist, else insert one minimal placeholder row so the route is not lost.
pub async fn update_source_destination(
    pool: &SqlitePool,
    stn: &str,
    source: &str,
    destination: &str,
) -> Result<()> {
    let res = sqlx::query("update ledger set source = ?, destination = ? where stn = ?")
        .bind(source)
        .bind(destination)
        .bind(stn)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        sqlx::query("insert into ledger (stn, source, destination) values (?, ?, ?)")
            .bind(stn)
            .bind(source)
            .bind(destination)
            .execute(pool)
            .await?;
        tracing::info!(stn, "route stored on placeholder row (stn not ingested yet)");
    }

    Ok(())
}

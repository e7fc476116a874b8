//! Physical reorg: rebuild the ledger ordered by shelf.
//!
//! SQLite has no clustered indexes, so "the ledger is shelf-sorted" means
//! literally rewriting the table: a sorted copy is built, the original is
//! dropped, the copy is renamed in and the indexes are recreated from their
//! original definitions. The whole sequence runs inside one transaction;
//! any failure rolls back and leaves the visible `ledger` untouched.
//!
//! After the rebuild, rowid order equals the sorted order — deliberately:
//! every "earliest-inserted" rule elsewhere then walks the warehouse in
//! shelf order, which is what the picking flow wants.

use sqlx::SqlitePool;

use crate::error::{LedgerError, Result};
use crate::ColumnInfo;

const SCRATCH_TABLE: &str = "ledger_sorted";

/// Rebuild `ledger` ordered by `(shelf empty) ASC, lower(shelf) ASC,
/// rowid ASC` — empty shelves last, ties keep their previous order.
/// Preserves every column value (columns added by later migrations
/// included), the row count, and all index definitions.
pub async fn sort_by_shelf_ascending(pool: &SqlitePool) -> Result<()> {
    let columns = crate::table_columns(pool).await?;
    if columns.is_empty() {
        return Err(LedgerError::Reorg {
            detail: "ledger table not found".into(),
        });
    }

    let index_sql = index_definitions(pool).await?;

    let col_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut tx = pool.begin().await.map_err(reorg_err)?;

    sqlx::query(&format!("drop table if exists {SCRATCH_TABLE}"))
        .execute(&mut *tx)
        .await
        .map_err(reorg_err)?;

    sqlx::query(&create_table_sql(SCRATCH_TABLE, &columns))
        .execute(&mut *tx)
        .await
        .map_err(reorg_err)?;

    sqlx::query(&format!(
        r#"
        insert into {SCRATCH_TABLE} ({col_list})
        select {col_list}
        from ledger
        order by
          case when ifnull(shelf, '') = '' then 1 else 0 end asc,
          lower(shelf) asc,
          rowid asc
        "#,
    ))
    .execute(&mut *tx)
    .await
    .map_err(reorg_err)?;

    // Row-count check before the destructive step; a mismatch aborts with
    // the original table intact.
    let (before,): (i64,) = sqlx::query_as("select count(*) from ledger")
        .fetch_one(&mut *tx)
        .await
        .map_err(reorg_err)?;
    let (after,): (i64,) = sqlx::query_as(&format!("select count(*) from {SCRATCH_TABLE}"))
        .fetch_one(&mut *tx)
        .await
        .map_err(reorg_err)?;
    if before != after {
        return Err(LedgerError::Reorg {
            detail: format!("row count changed during copy: {before} -> {after}"),
        });
    }

    sqlx::query("drop table ledger")
        .execute(&mut *tx)
        .await
        .map_err(reorg_err)?;

    sqlx::query(&format!("alter table {SCRATCH_TABLE} rename to ledger"))
        .execute(&mut *tx)
        .await
        .map_err(reorg_err)?;

    for sql in &index_sql {
        sqlx::query(sql).execute(&mut *tx).await.map_err(reorg_err)?;
    }

    tx.commit().await.map_err(reorg_err)?;

    tracing::debug!(rows = after, "ledger reorganized by shelf");
    Ok(())
}

/// Index DDL as recorded by SQLite. Auto-indexes have NULL sql and are
/// excluded; they are recreated implicitly.
async fn index_definitions(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        select sql
        from sqlite_master
        where type = 'index' and tbl_name = 'ledger' and sql is not null
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(s,)| s).collect())
}

fn create_table_sql(table: &str, columns: &[ColumnInfo]) -> String {
    let defs = columns
        .iter()
        .map(|c| {
            let mut def = format!("\"{}\" {}", c.name, c.ty);
            if c.pk {
                def.push_str(" primary key");
            }
            if c.notnull {
                def.push_str(" not null");
            }
            if let Some(d) = &c.default {
                def.push_str(" default ");
                def.push_str(d);
            }
            def
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("create table {table} ({defs})")
}

fn reorg_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Reorg {
        detail: e.to_string(),
    }
}

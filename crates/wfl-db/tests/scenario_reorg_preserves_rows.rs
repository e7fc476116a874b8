use std::collections::BTreeMap;

use sqlx::SqlitePool;
use wfl_db::UnitRow;

/// Reorg round-trip: the row multiset is unchanged, the shelf sequence is
/// non-decreasing case-insensitively, and empty shelves sort last.
#[tokio::test]
async fn reorg_preserves_row_set_and_orders_shelves() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    let seeds = [
        ("Z1", Some("BX1"), Some("picked")),
        ("a2", None, None),
        ("", None, None),
        ("A10", Some("BX2"), None),
        ("B1", None, None),
        ("A2", None, None),
        ("", Some("BX3"), Some("picked")),
    ];
    for (shelf, box_id, pick) in seeds {
        sqlx::query(
            "insert into ledger (stn, tl_id, qty, shelf, box_id, pick) values ('S', 'T', 1, ?, ?, ?)",
        )
        .bind(shelf)
        .bind(box_id)
        .bind(pick)
        .execute(&pool)
        .await?;
    }

    let before = multiset(wfl_db::fetch_all_rows(&pool).await?);

    wfl_db::sort_by_shelf_ascending(&pool).await?;

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(multiset(rows.clone()), before);

    let shelves: Vec<String> = rows
        .iter()
        .map(|r| r.shelf.clone().unwrap_or_default())
        .collect();

    let nonempty: Vec<&String> = shelves.iter().filter(|s| !s.is_empty()).collect();
    let empties = shelves.iter().filter(|s| s.is_empty()).count();
    assert_eq!(empties, 2);
    // Empty shelves trail the sequence.
    assert!(shelves[shelves.len() - empties..].iter().all(|s| s.is_empty()));
    // Case-insensitive non-decreasing.
    for w in nonempty.windows(2) {
        assert!(
            w[0].to_lowercase() <= w[1].to_lowercase(),
            "out of order: {} then {}",
            w[0],
            w[1]
        );
    }

    Ok(())
}

/// Indexes survive the rebuild with their original definitions.
#[tokio::test]
async fn reorg_recreates_indexes() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    sqlx::query("insert into ledger (stn, tl_id, qty, shelf) values ('S', 'T', 1, 'A1')")
        .execute(&pool)
        .await?;

    let before = index_names(&pool).await?;
    assert!(before.contains(&"idx_ledger_shelf".to_string()));

    wfl_db::sort_by_shelf_ascending(&pool).await?;

    let after = index_names(&pool).await?;
    assert_eq!(before, after);
    Ok(())
}

/// Columns added by a later migration ride through the reorg with their
/// values intact.
#[tokio::test]
async fn reorg_keeps_migrated_columns() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    assert!(wfl_db::add_column_if_missing(&pool, "hold_reason", "text").await?);

    sqlx::query(
        "insert into ledger (stn, tl_id, qty, shelf, hold_reason) values ('S', 'T', 1, 'B1', 'damaged')",
    )
    .execute(&pool)
    .await?;
    sqlx::query("insert into ledger (stn, tl_id, qty, shelf) values ('S', 'T', 1, 'A1')")
        .execute(&pool)
        .await?;

    wfl_db::sort_by_shelf_ascending(&pool).await?;

    let (reason,): (Option<String>,) =
        sqlx::query_as("select hold_reason from ledger where shelf = 'B1'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(reason.as_deref(), Some("damaged"));
    Ok(())
}

fn multiset(rows: Vec<UnitRow>) -> BTreeMap<String, usize> {
    let mut m = BTreeMap::new();
    for r in rows {
        *m.entry(format!("{r:?}")).or_insert(0) += 1;
    }
    m
}

async fn index_names(pool: &SqlitePool) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "select name from sqlite_master where type = 'index' and tbl_name = 'ledger' and sql is not null order by name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}

async fn mem_pool() -> anyhow::Result<SqlitePool> {
    let pool = wfl_db::connect("sqlite::memory:").await?;
    wfl_db::ensure_schema(&pool).await?;
    Ok(pool)
}

use sqlx::SqlitePool;

/// Three eligible rows, two generated ids: exactly two rows assigned, the
/// shortfall is reported through the return value (never an error).
#[tokio::test]
async fn shortfall_assigns_what_it_can() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    for _ in 0..3 {
        seed(&pool, "STN1", "TL1", "A1", None, None).await?;
    }

    let ids = vec!["BX-001".to_string(), "BX-002".to_string()];
    let assigned =
        wfl_db::assign_box_ids_to_stns(&pool, &ids, &["STN1".to_string()]).await?;

    assert_eq!(assigned.len(), 2);
    assert_eq!(assigned[0].box_id, "BX-001");
    assert_eq!(assigned[1].box_id, "BX-002");

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    let with_box = rows
        .iter()
        .filter(|r| r.box_id.as_deref().is_some_and(|b| !b.is_empty()))
        .count();
    assert_eq!(with_box, 2);
    Ok(())
}

/// STN order in the argument list outranks insertion order; within an STN
/// rows fill oldest-first. Rows that already carry a box id are skipped.
#[tokio::test]
async fn stn_priority_then_insertion_order() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    seed(&pool, "STN-B", "TL1", "A1", None, None).await?;
    seed(&pool, "STN-A", "TL1", "A1", None, None).await?;
    seed(&pool, "STN-A", "TL1", "A2", Some("OLDBOX"), None).await?;
    seed(&pool, "STN-A", "TL1", "A3", None, None).await?;

    let ids: Vec<String> = vec!["B1".into(), "B2".into(), "B3".into()];
    let stns: Vec<String> = vec!["STN-A".into(), "STN-B".into()];
    let assigned = wfl_db::assign_box_ids_to_stns(&pool, &ids, &stns).await?;

    assert_eq!(assigned.len(), 3);
    // STN-A's two eligible rows first (oldest first), then STN-B's.
    assert_eq!(assigned[0].stn, "STN-A");
    assert_eq!(assigned[1].stn, "STN-A");
    assert_eq!(assigned[2].stn, "STN-B");

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    let oldbox = rows
        .iter()
        .find(|r| r.shelf.as_deref() == Some("A2"))
        .unwrap();
    assert_eq!(oldbox.box_id.as_deref(), Some("OLDBOX"));
    Ok(())
}

/// Tiered next-box selection for a TL+shelf pair.
#[tokio::test]
async fn next_box_tiers() -> anyhow::Result<()> {
    let pool = mem_pool().await?;

    // Tier 1: unpicked row with a box on the pair wins, earliest first.
    seed(&pool, "STN1", "TL1", "A1", Some("BX-EARLY"), None).await?;
    seed(&pool, "STN1", "TL1", "A1", Some("BX-LATE"), None).await?;
    assert_eq!(
        wfl_db::next_unpicked_box_for_tl_shelf(&pool, "TL1", "A1")
            .await?
            .as_deref(),
        Some("BX-EARLY")
    );

    // Tier 2: everything on the pair picked -> latest boxed row.
    sqlx::query("update ledger set pick = 'done'")
        .execute(&pool)
        .await?;
    assert_eq!(
        wfl_db::next_unpicked_box_for_tl_shelf(&pool, "TL1", "A1")
            .await?
            .as_deref(),
        Some("BX-LATE")
    );

    // Tier 3: no boxed rows on the pair -> latest box for the TL alone.
    assert_eq!(
        wfl_db::next_unpicked_box_for_tl_shelf(&pool, "TL1", "ZZ")
            .await?
            .as_deref(),
        Some("BX-LATE")
    );

    // Nothing anywhere for an unknown TL.
    assert_eq!(
        wfl_db::next_unpicked_box_for_tl_shelf(&pool, "TL9", "A1").await?,
        None
    );
    Ok(())
}

async fn seed(
    pool: &SqlitePool,
    stn: &str,
    tl: &str,
    shelf: &str,
    box_id: Option<&str>,
    pick: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        "insert into ledger (stn, tl_id, qty, shelf, box_id, pick) values (?, ?, 1, ?, ?, ?)",
    )
    .bind(stn)
    .bind(tl)
    .bind(shelf)
    .bind(box_id)
    .bind(pick)
    .execute(pool)
    .await?;
    Ok(())
}

async fn mem_pool() -> anyhow::Result<SqlitePool> {
    let pool = wfl_db::connect("sqlite::memory:").await?;
    wfl_db::ensure_schema(&pool).await?;
    Ok(pool)
}

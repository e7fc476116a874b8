use std::sync::Arc;

use wfl_pick::{PickSession, Stage, TransitionOutcome};
use wfl_testkit::{mem_ledger, seed_row, FakeLabelPrinter, FakeWarehouseUi, SeedRow};

/// Applying the same pack completion twice yields the same stored value and
/// no duplicate rows — the write is an unconditional overwrite with the
/// same canonical bytes.
#[tokio::test]
async fn pack_update_is_idempotent() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(
        &pool,
        &SeedRow::new("STN1", "TL1", "A1").boxed("BX1").picked("p"),
    )
    .await?;
    seed_row(
        &pool,
        &SeedRow::new("STN1", "TL1", "A2").boxed("BX1").picked("p"),
    )
    .await?;

    let session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let msg = "Box packed with id - BX1";
    let first = session.apply_completion(Stage::Pack, "BX1", msg).await?;
    let second = session.apply_completion(Stage::Pack, "BX1", msg).await?;

    assert_eq!(first, second);
    assert!(matches!(first, TransitionOutcome::Applied { rows: 2, .. }));

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(rows.len(), 2, "no duplicate rows");
    for r in rows {
        assert_eq!(r.pack.as_deref(), Some(msg));
    }
    Ok(())
}

/// The banner path is idempotent twice over: the processed-set makes a
/// re-observed banner a no-op, and even a forced re-write stores identical
/// bytes.
#[tokio::test]
async fn banner_replay_is_a_noop() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BX1")).await?;

    let mut session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let banner = "Tote/Box BX1 is closed successfully";
    let first = session.handle_banner(banner).await?;
    assert!(matches!(first, TransitionOutcome::Applied { .. }));

    let replay = session.handle_banner(banner).await?;
    assert_eq!(
        replay,
        TransitionOutcome::DuplicateBanner {
            box_id: "BX1".into()
        }
    );

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(rows[0].pick.as_deref(), Some(banner));
    Ok(())
}

/// A banner naming the box in a different case than stored still records the
/// pick, and the correctly-cased replay is the duplicate — not the other way
/// around.
#[tokio::test]
async fn case_variant_banner_still_records() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BX1")).await?;

    let mut session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let first = session
        .handle_banner("Tote/Box bx1 is closed successfully")
        .await?;
    assert!(matches!(first, TransitionOutcome::Applied { rows: 1, .. }));

    let replay = session
        .handle_banner("Tote/Box BX1 is closed successfully")
        .await?;
    assert_eq!(
        replay,
        TransitionOutcome::DuplicateBanner {
            box_id: "BX1".into()
        }
    );

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(
        rows[0].pick.as_deref(),
        Some("Tote/Box bx1 is closed successfully")
    );
    Ok(())
}

/// A banner naming a box the ledger does not know is flagged, never marked
/// processed, and never blocks a later banner for a real box.
#[tokio::test]
async fn phantom_box_banner_is_flagged() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BX1")).await?;

    let mut session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let ghost = "Tote/Box GHOST9 is closed successfully";
    let first = session.handle_banner(ghost).await?;
    assert_eq!(
        first,
        TransitionOutcome::UnknownBox {
            box_id: "GHOST9".into()
        }
    );

    // Not deduped: the same phantom banner reports the same problem again.
    let again = session.handle_banner(ghost).await?;
    assert_eq!(
        again,
        TransitionOutcome::UnknownBox {
            box_id: "GHOST9".into()
        }
    );

    let real = session
        .handle_banner("Tote/Box BX1 is closed successfully")
        .await?;
    assert!(matches!(real, TransitionOutcome::Applied { rows: 1, .. }));
    Ok(())
}

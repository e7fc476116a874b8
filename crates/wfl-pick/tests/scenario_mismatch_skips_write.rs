use std::sync::Arc;

use wfl_pick::{PickSession, Stage, TransitionOutcome};
use wfl_testkit::{mem_ledger, seed_row, FakeLabelPrinter, FakeWarehouseUi, SeedRow};

/// A completion message naming a different box than expected is skipped:
/// nothing is written, and the outcome says which boxes disagreed.
#[tokio::test]
async fn mismatched_box_leaves_pick_untouched() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BOX5")).await?;

    let session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let outcome = session
        .apply_completion(Stage::Pick, "BOX5", "Tote/Box BOX9 is closed successfully")
        .await?;

    assert_eq!(
        outcome,
        TransitionOutcome::SkippedMismatch {
            expected: "BOX5".into(),
            observed: "BOX9".into(),
        }
    );

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(rows[0].pick, None, "mismatch must not write pick");
    Ok(())
}

/// A message with no recognizable box id is reported, not committed.
#[tokio::test]
async fn message_without_box_id_is_not_committed() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BOX5")).await?;

    let session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let outcome = session
        .apply_completion(Stage::Pick, "BOX5", "operation finished")
        .await?;
    assert_eq!(outcome, TransitionOutcome::NoBoxId);

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    assert_eq!(rows[0].pick, None);
    Ok(())
}

/// Matching box ids commit the canonicalized message.
#[tokio::test]
async fn matching_box_commits_canonical_message() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BOX5")).await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A2").boxed("BOX5")).await?;

    let session = PickSession::new(
        pool.clone(),
        Arc::new(FakeWarehouseUi::new()),
        Arc::new(FakeLabelPrinter::new()),
    );

    let outcome = session
        .apply_completion(Stage::Pick, "BOX5", "  Tote/Box   BOX5 is closed successfully ")
        .await?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            box_id: "BOX5".into(),
            rows: 2,
        }
    );

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    for r in rows {
        assert_eq!(
            r.pick.as_deref(),
            Some("Tote/Box BOX5 is closed successfully")
        );
    }
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wfl_pick::{EngineEvent, PickSession};
use wfl_poller::{PollerConfig, PollerHandle};
use wfl_testkit::{mem_ledger, seed_row, FakeLabelPrinter, FakeWarehouseUi, SeedRow};

fn fast_cfg() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        collab_timeout: Duration::from_millis(500),
    }
}

/// The poller forwards each visible banner; the engine's processed-set makes
/// a re-observed banner a no-op, so the ledger ends up with exactly one
/// canonical write per box.
#[tokio::test]
async fn duplicate_banners_write_once() -> anyhow::Result<()> {
    let pool = mem_ledger().await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A1").boxed("BX1")).await?;
    seed_row(&pool, &SeedRow::new("STN1", "TL1", "A2").boxed("BX2")).await?;

    let ui = Arc::new(FakeWarehouseUi::new());
    ui.push_banner("Tote/Box BX1 is closed successfully");
    ui.push_banner("Tote/Box BX1 is closed successfully");
    ui.push_banner("Tote/Box BX2 is closed successfully");

    let (tx, rx) = mpsc::channel(16);
    let session = PickSession::new(
        pool.clone(),
        ui.clone(),
        Arc::new(FakeLabelPrinter::new()),
    );
    let engine = tokio::spawn(session.run(rx));

    let poller = wfl_poller::spawn(ui, tx.clone(), fast_cfg());

    // Three banners at 10ms ticks; generous margin.
    tokio::time::sleep(Duration::from_millis(300)).await;

    poller.shutdown().await;
    tx.send(EngineEvent::Shutdown).await?;
    engine.await?;

    let rows = wfl_db::fetch_all_rows(&pool).await?;
    for r in rows {
        assert_eq!(
            r.pick.as_deref().map(|p| p.starts_with("Tote/Box")),
            Some(true),
            "every box picked exactly once via banner path"
        );
    }
    Ok(())
}

/// The layered config's timing fields drive the poller directly.
#[tokio::test]
async fn poller_runs_on_config_timings() -> anyhow::Result<()> {
    let loaded = wfl_config::load_layered_yaml_from_strings(&[
        "poll_interval_ms: 10\ncollaborator_timeout_ms: 200\n",
    ])?;
    let cfg = PollerConfig {
        interval: loaded.config.poll_interval(),
        collab_timeout: loaded.config.collaborator_timeout(),
    };
    assert_eq!(cfg.interval, Duration::from_millis(10));

    let ui = Arc::new(FakeWarehouseUi::new());
    ui.push_banner("Tote/Box BX7 is closed successfully");

    let (tx, mut rx) = mpsc::channel(4);
    let poller = wfl_poller::spawn(ui, tx, cfg);

    let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await?
        .expect("banner event");
    assert_eq!(
        event,
        EngineEvent::Banner("Tote/Box BX7 is closed successfully".into())
    );

    poller.shutdown().await;
    Ok(())
}

/// Shutdown stops the loop; dropping the engine receiver also ends it.
#[tokio::test]
async fn poller_stops_on_shutdown_and_closed_channel() -> anyhow::Result<()> {
    let ui = Arc::new(FakeWarehouseUi::new());

    let (tx, rx) = mpsc::channel(4);
    let poller = wfl_poller::spawn(ui.clone(), tx, fast_cfg());
    assert!(!poller.is_finished());
    poller.shutdown().await;

    // Closed channel: the loop exits once it observes a banner to forward.
    let (tx2, rx2) = mpsc::channel(4);
    drop(rx2);
    ui.push_banner("Tote/Box BX9 is closed successfully");
    let poller2: PollerHandle = wfl_poller::spawn(ui, tx2, fast_cfg());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(poller2.is_finished());
    poller2.shutdown().await;

    drop(rx);
    Ok(())
}

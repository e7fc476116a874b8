//! Background banner poller.
//!
//! A fixed-interval task that asks the warehouse UI for the currently
//! visible success banner and forwards any hit to the engine channel as an
//! [`EngineEvent::Banner`]. The poller never writes the ledger itself —
//! the single engine task does — so the two event paths need no shared
//! locks (see the engine's module docs).
//!
//! A failed or timed-out tick is logged and the loop continues on its next
//! interval; nothing is allowed to block the loop's own scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wfl_collab::WarehouseUi;
use wfl_pick::EngineEvent;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Tick interval; the source flow polls every 500–800ms.
    pub interval: Duration,
    /// Upper bound on one `observe_success_banner` call. Applies to the
    /// collaborator only, never to ledger operations.
    pub collab_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(650),
            collab_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle owning the poller task and its shutdown signal.
/// [`PollerHandle::shutdown`] stops the loop at its next select point;
/// dropping the handle stops it too.
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the loop to exit and wait for it.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the polling loop. The loop also ends on its own when the engine
/// side of the channel goes away.
pub fn spawn<U>(ui: Arc<U>, tx: mpsc::Sender<EngineEvent>, cfg: PollerConfig) -> PollerHandle
where
    U: WarehouseUi + 'static,
{
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        // A delayed tick should not cause a burst of catch-up polls.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {}
            }

            let banner =
                match tokio::time::timeout(cfg.collab_timeout, ui.observe_success_banner()).await {
                    Err(_) => {
                        warn!("banner poll timed out; retrying next tick");
                        continue;
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "banner poll failed; retrying next tick");
                        continue;
                    }
                    Ok(Ok(None)) => continue,
                    Ok(Ok(Some(text))) => text,
                };

            debug!(banner = %banner, "success banner observed");
            if tx.send(EngineEvent::Banner(banner)).await.is_err() {
                // Engine gone; nobody left to consume observations.
                break;
            }
        }
    });

    PollerHandle { stop, task }
}

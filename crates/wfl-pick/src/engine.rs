//! Pick/pack transition engine.
//!
//! A [`PickSession`] owns the ledger pool, the collaborator handles, the
//! current [`PickContext`] and the session-scoped processed-box set. Two
//! event sources drive it: the synchronous scan path (shelf scan → code
//! scan → physical pick → completion message) and the asynchronous banner
//! path fed by the poller. Both end in the same canonicalize-and-write
//! step, so replaying an observation is a no-op in effect.
//!
//! Run [`PickSession::run`] as the single consumer of an [`EngineEvent`]
//! channel and both paths serialize through one writer — no locking needed
//! beyond the storage transaction each write already gets.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wfl_collab::{LabelPrinter, ScanKind, StampRequest, WarehouseUi};
use wfl_db::{AssignedBox, LedgerError};

use crate::matcher;
use crate::messages::{canonicalize, mentions_tl_complete, parse_box_id};

/// Which ledger column a completion writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pick,
    Pack,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pick => "pick",
            Stage::Pack => "pack",
        }
    }
}

/// Immutable per-step context: the TL, shelf and box the operator is
/// currently working. Rebuilt on every shelf scan, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickContext {
    pub tl_id: String,
    pub shelf: String,
    pub box_id: String,
}

/// Human-readable result of one transition. Surfaced to the operator as a
/// status line; never an error for the caller's caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Canonical message written for the box.
    Applied { box_id: String, rows: u64 },
    /// The completion message named a different box; nothing was written.
    SkippedMismatch { expected: String, observed: String },
    /// No box identifier could be parsed out of the message.
    NoBoxId,
    /// This box's banner was already processed in this session.
    DuplicateBanner { box_id: String },
    /// The banner named a box no ledger row carries; nothing was written.
    UnknownBox { box_id: String },
    /// The scanned code matched nothing on the TL+shelf pair.
    NotRecognized { scanned: String },
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionOutcome::Applied { box_id, rows } => {
                write!(f, "recorded completion for box {box_id} ({rows} rows)")
            }
            TransitionOutcome::SkippedMismatch { expected, observed } => write!(
                f,
                "completion names box {observed}, expected {expected}; nothing written"
            ),
            TransitionOutcome::NoBoxId => {
                write!(f, "no box identifier found in completion message")
            }
            TransitionOutcome::DuplicateBanner { box_id } => {
                write!(f, "banner for box {box_id} already processed")
            }
            TransitionOutcome::UnknownBox { box_id } => {
                write!(f, "box {box_id} is not in the ledger; nothing recorded")
            }
            TransitionOutcome::NotRecognized { scanned } => {
                write!(f, "scanned code {scanned:?} not recognized on this shelf")
            }
        }
    }
}

/// Events consumed by the engine task. Scan events arrive from the
/// browser-automation collaborator; banners from the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ShelfScan(String),
    CodeScan(String),
    Banner(String),
    Shutdown,
}

impl EngineEvent {
    /// Map a collaborator scan event onto the engine's vocabulary. WID scans
    /// go through the code path — a WID is just another identifying token
    /// as far as the matcher is concerned.
    pub fn from_scan(kind: ScanKind, payload: String) -> Self {
        match kind {
            ScanKind::Shelf => EngineEvent::ShelfScan(payload),
            ScanKind::Wid | ScanKind::Code => EngineEvent::CodeScan(payload),
        }
    }
}

/// Guard used before committing a completion write.
pub fn verify_expected_box(expected: &str, observed: &str) -> Result<(), LedgerError> {
    if expected.eq_ignore_ascii_case(observed) {
        Ok(())
    } else {
        Err(LedgerError::Mismatch {
            expected: expected.to_string(),
            observed: observed.to_string(),
        })
    }
}

/// Sorted distinct shelves treated as a cycle: the shelf after `current`,
/// wrapping to the first after the last. An unknown current shelf restarts
/// the cycle at the beginning.
pub fn next_shelf_cyclic(shelves: &[String], current: &str) -> Option<String> {
    if shelves.is_empty() {
        return None;
    }
    match shelves.iter().position(|s| s.eq_ignore_ascii_case(current)) {
        Some(i) => Some(shelves[(i + 1) % shelves.len()].clone()),
        None => Some(shelves[0].clone()),
    }
}

pub struct PickSession<U, L> {
    pool: SqlitePool,
    ui: Arc<U>,
    labels: Arc<L>,
    stage: Stage,
    ctx: Option<PickContext>,
    suggested_shelf: Option<String>,
    /// Box ids (case-folded) whose completion has been handled this session.
    processed_boxes: HashSet<String>,
    collab_timeout: Duration,
}

impl<U: WarehouseUi, L: LabelPrinter> PickSession<U, L> {
    pub fn new(pool: SqlitePool, ui: Arc<U>, labels: Arc<L>) -> Self {
        Self {
            pool,
            ui,
            labels,
            stage: Stage::Pick,
            ctx: None,
            suggested_shelf: None,
            processed_boxes: HashSet::new(),
            collab_timeout: Duration::from_secs(10),
        }
    }

    /// Timeout applied to collaborator calls (never to ledger operations).
    pub fn with_collab_timeout(mut self, timeout: Duration) -> Self {
        self.collab_timeout = timeout;
        self
    }

    pub fn context(&self) -> Option<&PickContext> {
        self.ctx.as_ref()
    }

    /// Shelf to suggest after the last successful pick.
    pub fn suggested_shelf(&self) -> Option<&str> {
        self.suggested_shelf.as_deref()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Synchronous path, step 1: a shelf was scanned. Resolves the active TL
    /// and the box to pick into a fresh context. A failed resolution halts
    /// this step only; the operator scans again.
    pub async fn scan_shelf(&mut self, shelf: &str) -> Result<PickContext, LedgerError> {
        let tl_id = wfl_db::tl_for_shelf(&self.pool, shelf)
            .await?
            .ok_or_else(|| LedgerError::Resolution {
                what: format!("no transfer list active for shelf {shelf}"),
            })?;

        let box_id = wfl_db::next_unpicked_box_for_tl_shelf(&self.pool, &tl_id, shelf)
            .await?
            .ok_or_else(|| LedgerError::Resolution {
                what: format!("no box allocated for TL {tl_id} on shelf {shelf}"),
            })?;

        let ctx = PickContext {
            tl_id,
            shelf: shelf.to_string(),
            box_id,
        };
        info!(tl = %ctx.tl_id, shelf = %ctx.shelf, box_id = %ctx.box_id, "pick context resolved");
        self.ctx = Some(ctx.clone());
        Ok(ctx)
    }

    /// Synchronous path, step 2: an identifying code was scanned. The
    /// matcher gates; on a match the collaborator executes the physical pick
    /// and its completion message is committed if it names the expected box.
    pub async fn scan_code(&mut self, scanned: &str) -> anyhow::Result<TransitionOutcome> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| LedgerError::Resolution {
                what: "no active pick context; scan a shelf first".into(),
            })?;

        if !matcher::match_any_code(&self.pool, &ctx.tl_id, &ctx.shelf, scanned).await? {
            return Ok(TransitionOutcome::NotRecognized {
                scanned: scanned.to_string(),
            });
        }

        let ack = self
            .collab(self.ui.trigger_physical_pick(&ctx.box_id))
            .await?;

        let outcome = self
            .apply_completion(Stage::Pick, &ctx.box_id, &ack)
            .await?;

        if let TransitionOutcome::Applied { box_id, .. } = &outcome {
            self.processed_boxes.insert(box_id.to_lowercase());
            self.advance_shelf(&ctx.shelf).await?;
            self.ctx = None;
        }

        Ok(outcome)
    }

    /// Shared commit step for both event paths: parse the box id out of the
    /// message, refuse to write when it is not the expected box, otherwise
    /// store the canonical message.
    pub async fn apply_completion(
        &self,
        stage: Stage,
        expected_box: &str,
        message: &str,
    ) -> Result<TransitionOutcome, LedgerError> {
        let canonical = canonicalize(message);

        let Some(observed) = parse_box_id(&canonical) else {
            warn!(stage = stage.as_str(), message = %canonical, "completion message carries no box id");
            return Ok(TransitionOutcome::NoBoxId);
        };

        match verify_expected_box(expected_box, &observed) {
            Ok(()) => {}
            Err(LedgerError::Mismatch { expected, observed }) => {
                warn!(%expected, %observed, "completion box mismatch; write skipped");
                return Ok(TransitionOutcome::SkippedMismatch { expected, observed });
            }
            Err(e) => return Err(e),
        }

        let rows = match stage {
            Stage::Pick => wfl_db::record_pick(&self.pool, expected_box, &canonical).await?,
            Stage::Pack => wfl_db::record_pack(&self.pool, expected_box, &canonical).await?,
        };

        info!(stage = stage.as_str(), box_id = expected_box, rows, "completion recorded");
        Ok(TransitionOutcome::Applied {
            box_id: expected_box.to_string(),
            rows,
        })
    }

    /// Asynchronous path: a success banner observed by the poller. Re-seeing
    /// a box is a no-op; a first observation gets the same canonical write
    /// as the synchronous path, a label stamp, and — when the banner
    /// mentions TL completion *and* every row of that TL is picked — the
    /// TL-complete mark. A completion claim for a TL with unpicked rows is
    /// logged and ignored, and a banner naming a box the ledger does not
    /// know surfaces as [`TransitionOutcome::UnknownBox`].
    pub async fn handle_banner(&mut self, text: &str) -> anyhow::Result<TransitionOutcome> {
        let canonical = canonicalize(text);

        let Some(box_id) = parse_box_id(&canonical) else {
            debug!(banner = %canonical, "banner carries no box id");
            return Ok(TransitionOutcome::NoBoxId);
        };

        let key = box_id.to_lowercase();
        if self.processed_boxes.contains(&key) {
            return Ok(TransitionOutcome::DuplicateBanner { box_id });
        }

        let rows = match self.stage {
            Stage::Pick => wfl_db::record_pick(&self.pool, &box_id, &canonical).await?,
            Stage::Pack => wfl_db::record_pack(&self.pool, &box_id, &canonical).await?,
        };
        // A write that touched nothing must not look like success, and the
        // box stays unprocessed so a later well-formed banner can still land.
        if rows == 0 {
            warn!(%box_id, "banner names a box with no ledger rows; nothing recorded");
            return Ok(TransitionOutcome::UnknownBox { box_id });
        }
        self.processed_boxes.insert(key);

        self.stamp_box(&box_id).await;

        if mentions_tl_complete(&canonical) {
            if let Some(tl) = wfl_db::tl_for_box(&self.pool, &box_id).await? {
                if wfl_db::tl_fully_picked(&self.pool, &tl).await? {
                    wfl_db::mark_tl_complete(&self.pool, &tl).await?;
                    info!(%tl, "transfer list complete");
                } else {
                    warn!(%tl, "banner claims TL complete but unpicked rows remain; leaving pending");
                }
            }
        }

        debug!(%box_id, rows, "banner completion recorded");
        Ok(TransitionOutcome::Applied { box_id, rows })
    }

    /// Open the box-creation dialog, assign the generated ids onto rows of
    /// the given STNs, and request a label per newly-assigned box.
    pub async fn create_and_assign_boxes(
        &self,
        quantity: u32,
        stns: &[String],
    ) -> anyhow::Result<Vec<AssignedBox>> {
        let ids = self.collab(self.ui.open_box_creation(quantity)).await?;
        let assigned = wfl_db::assign_box_ids_to_stns(&self.pool, &ids, stns).await?;

        for b in &assigned {
            let req = StampRequest {
                box_id: b.box_id.clone(),
                stn: b.stn.clone(),
                source: b.source.clone(),
                destination: b.destination.clone(),
            };
            if let Err(e) = self.collab(self.labels.stamp(req)).await {
                warn!(box_id = %b.box_id, error = %e, "label stamp failed");
            }
        }

        Ok(assigned)
    }

    /// Ledger-wide pack gate.
    pub async fn pack_ready(&self) -> Result<bool, LedgerError> {
        wfl_db::all_tls_complete(&self.pool).await
    }

    /// Pack every eligible box. Refuses outright while the global gate is
    /// closed; per-box mismatches are reported in the outcome list without
    /// stopping the rest.
    pub async fn pack_all(&mut self) -> anyhow::Result<Vec<(String, TransitionOutcome)>> {
        if !self.pack_ready().await? {
            return Err(LedgerError::Resolution {
                what: "pack gate closed: transfer lists still pending".into(),
            }
            .into());
        }

        self.stage = Stage::Pack;
        let mut out = Vec::new();

        for box_id in wfl_db::box_ids_to_pack(&self.pool).await? {
            let ack = self.collab(self.ui.trigger_physical_pick(&box_id)).await?;
            let outcome = self.apply_completion(Stage::Pack, &box_id, &ack).await?;
            if let TransitionOutcome::Applied { box_id, .. } = &outcome {
                self.processed_boxes.insert(box_id.to_lowercase());
            }
            out.push((box_id, outcome));
        }

        Ok(out)
    }

    /// Single-consumer event loop serializing both event paths.
    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        while let Some(ev) = rx.recv().await {
            match ev {
                EngineEvent::ShelfScan(shelf) => match self.scan_shelf(&shelf).await {
                    Ok(ctx) => debug!(tl = %ctx.tl_id, box_id = %ctx.box_id, "shelf scanned"),
                    Err(e) => warn!(%shelf, error = %e, "shelf scan failed"),
                },
                EngineEvent::CodeScan(code) => match self.scan_code(&code).await {
                    Ok(outcome) => info!(%outcome, "code scan"),
                    Err(e) => warn!(error = %e, "code scan failed"),
                },
                EngineEvent::Banner(text) => match self.handle_banner(&text).await {
                    Ok(outcome) => debug!(%outcome, "banner handled"),
                    Err(e) => warn!(error = %e, "banner handling failed"),
                },
                EngineEvent::Shutdown => break,
            }
        }
    }

    async fn advance_shelf(&mut self, from: &str) -> Result<(), LedgerError> {
        let shelves = wfl_db::distinct_shelves_sorted(&self.pool).await?;
        self.suggested_shelf = next_shelf_cyclic(&shelves, from);
        Ok(())
    }

    async fn stamp_box(&self, box_id: &str) {
        let route = match wfl_db::stn_route_for_box(&self.pool, box_id).await {
            Ok(Some(r)) => r,
            Ok(None) => return,
            Err(e) => {
                warn!(%box_id, error = %e, "route lookup for label failed");
                return;
            }
        };

        let req = StampRequest {
            box_id: box_id.to_string(),
            stn: route.stn,
            source: route.source,
            destination: route.destination,
        };
        if let Err(e) = self.collab(self.labels.stamp(req)).await {
            warn!(%box_id, error = %e, "label stamp failed");
        }
    }

    async fn collab<T, F>(&self, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::time::timeout(self.collab_timeout, fut)
            .await
            .map_err(|_| anyhow!("collaborator call timed out after {:?}", self.collab_timeout))?
    }
}

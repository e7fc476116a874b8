//! Collaborator interface boundary.
//!
//! The fulfillment core does not drive the warehouse web application or the
//! label printer itself; both are external collaborators reached through the
//! traits in this crate. Production implementations live outside this
//! workspace; tests use the scripted fakes in `wfl-testkit`.
//!
//! Collaborator failures are `anyhow::Error` — they are application-boundary
//! errors, not part of the ledger's typed taxonomy.

use anyhow::Result;
use async_trait::async_trait;

/// What a scanner event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// A physical shelf label.
    Shelf,
    /// A warehouse item id (WID).
    Wid,
    /// Any identifying item code (FSN / EAN / model id).
    Code,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Shelf => "shelf",
            ScanKind::Wid => "wid",
            ScanKind::Code => "code",
        }
    }
}

/// One label-stamp request, issued once per newly-assigned or newly-observed
/// box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRequest {
    pub box_id: String,
    pub stn: String,
    pub source: Option<String>,
    pub destination: Option<String>,
}

/// The browser-automation collaborator driving the warehouse web app.
///
/// Scan events travel the other way — the collaborator delivers them *to*
/// the core as engine events (`wfl-pick`), so they are not methods here.
#[async_trait]
pub trait WarehouseUi: Send + Sync {
    /// Poll the page for a visible success banner. `None` when nothing new
    /// is showing.
    async fn observe_success_banner(&self) -> Result<Option<String>>;

    /// Execute the physical pick action for `box_id` and return the
    /// completion message the application reported.
    async fn trigger_physical_pick(&self, box_id: &str) -> Result<String>;

    /// Open the box-creation dialog and generate `quantity` fresh box ids.
    async fn open_box_creation(&self, quantity: u32) -> Result<Vec<String>>;
}

/// The label/PDF collaborator.
#[async_trait]
pub trait LabelPrinter: Send + Sync {
    /// Request a shipping label for a box.
    async fn stamp(&self, req: StampRequest) -> Result<()>;
}

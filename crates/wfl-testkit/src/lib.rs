//! Test helpers shared by scenario tests across the workspace: an in-memory
//! ledger, row seeding, and scripted fakes for the two collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use wfl_collab::{LabelPrinter, StampRequest, WarehouseUi};

/// Fresh in-memory ledger with the schema applied.
pub async fn mem_ledger() -> Result<SqlitePool> {
    let pool = wfl_db::connect("sqlite::memory:").await?;
    wfl_db::ensure_schema(&pool).await?;
    Ok(pool)
}

/// One row to seed, with everything optional except the STN. Field names
/// match the ledger columns.
#[derive(Debug, Clone, Default)]
pub struct SeedRow {
    pub stn: String,
    pub tl_id: Option<String>,
    pub shelf: Option<String>,
    pub fsn: Option<String>,
    pub ean: Option<String>,
    pub model_id: Option<String>,
    pub box_id: Option<String>,
    pub pick: Option<String>,
    pub pack: Option<String>,
    pub tl_status: Option<String>,
}

impl SeedRow {
    pub fn new(stn: &str, tl_id: &str, shelf: &str) -> Self {
        SeedRow {
            stn: stn.to_string(),
            tl_id: Some(tl_id.to_string()),
            shelf: Some(shelf.to_string()),
            ..Default::default()
        }
    }

    pub fn ean(mut self, ean: &str) -> Self {
        self.ean = Some(ean.to_string());
        self
    }

    pub fn fsn(mut self, fsn: &str) -> Self {
        self.fsn = Some(fsn.to_string());
        self
    }

    pub fn boxed(mut self, box_id: &str) -> Self {
        self.box_id = Some(box_id.to_string());
        self
    }

    pub fn picked(mut self, msg: &str) -> Self {
        self.pick = Some(msg.to_string());
        self
    }
}

pub async fn seed_row(pool: &SqlitePool, row: &SeedRow) -> Result<()> {
    sqlx::query(
        r#"
        insert into ledger (stn, tl_id, qty, shelf, fsn, ean, model_id, box_id, pick, pack, tl_status)
        values (?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.stn)
    .bind(&row.tl_id)
    .bind(&row.shelf)
    .bind(&row.fsn)
    .bind(&row.ean)
    .bind(&row.model_id)
    .bind(&row.box_id)
    .bind(&row.pick)
    .bind(&row.pack)
    .bind(&row.tl_status)
    .execute(pool)
    .await?;
    Ok(())
}

/// Scripted warehouse UI: banners pop in the order they were pushed, picks
/// are recorded, box ids come from a script or a counter.
#[derive(Default)]
pub struct FakeWarehouseUi {
    banners: Mutex<VecDeque<String>>,
    picks: Mutex<Vec<String>>,
    acks: Mutex<HashMap<String, String>>,
    scripted_boxes: Mutex<VecDeque<String>>,
    box_counter: AtomicU32,
}

impl FakeWarehouseUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a banner for the poller to observe.
    pub fn push_banner(&self, text: &str) {
        self.banners.lock().unwrap().push_back(text.to_string());
    }

    /// Override the completion ack for one box (default: a well-formed
    /// "closed successfully" message naming that box).
    pub fn set_ack(&self, box_id: &str, ack: &str) {
        self.acks
            .lock()
            .unwrap()
            .insert(box_id.to_string(), ack.to_string());
    }

    /// Script the ids returned by box creation.
    pub fn script_boxes(&self, ids: &[&str]) {
        let mut q = self.scripted_boxes.lock().unwrap();
        for id in ids {
            q.push_back(id.to_string());
        }
    }

    /// Box ids whose physical pick was triggered, in order.
    pub fn picks(&self) -> Vec<String> {
        self.picks.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseUi for FakeWarehouseUi {
    async fn observe_success_banner(&self) -> Result<Option<String>> {
        Ok(self.banners.lock().unwrap().pop_front())
    }

    async fn trigger_physical_pick(&self, box_id: &str) -> Result<String> {
        self.picks.lock().unwrap().push(box_id.to_string());
        let ack = self
            .acks
            .lock()
            .unwrap()
            .get(box_id)
            .cloned()
            .unwrap_or_else(|| format!("Tote/Box {box_id} is closed successfully"));
        Ok(ack)
    }

    async fn open_box_creation(&self, quantity: u32) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(quantity as usize);
        let mut scripted = self.scripted_boxes.lock().unwrap();
        for _ in 0..quantity {
            match scripted.pop_front() {
                Some(id) => out.push(id),
                None => {
                    let n = self.box_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    out.push(format!("BX-{n:03}"));
                }
            }
        }
        Ok(out)
    }
}

/// Label printer that records stamp requests.
#[derive(Default)]
pub struct FakeLabelPrinter {
    stamps: Mutex<Vec<StampRequest>>,
}

impl FakeLabelPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamps(&self) -> Vec<StampRequest> {
        self.stamps.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelPrinter for FakeLabelPrinter {
    async fn stamp(&self, req: StampRequest) -> Result<()> {
        self.stamps.lock().unwrap().push(req);
        Ok(())
    }
}

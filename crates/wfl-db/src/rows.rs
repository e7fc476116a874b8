//! Row-level types for the `ledger` table.
//!
//! One row is exactly one physical unit of inventory. Multi-unit source
//! lines are exploded at ingestion, so `qty` is always 1 on ingested rows.

use sqlx::Row;

/// The string the external application stores for a completed transfer list.
pub const TL_COMPLETE_SENTINEL: &str = "TL Complete";

/// Closed status for a transfer list, replacing the stored free-text
/// sentinel. Anything other than the exact sentinel counts as pending —
/// the same rule the global pack gate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlStatus {
    Pending,
    Complete,
}

impl TlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlStatus::Pending => "",
            TlStatus::Complete => TL_COMPLETE_SENTINEL,
        }
    }

    /// Decode the stored column value.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s == TL_COMPLETE_SENTINEL => TlStatus::Complete,
            _ => TlStatus::Pending,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, TlStatus::Complete)
    }
}

/// One scraped STN line item as delivered by the ingestion collaborator.
/// `qty` may be zero or negative in scraped data; ingestion degrades it to 1.
#[derive(Debug, Clone)]
pub struct ScrapedItem {
    pub wid: String,
    pub fsn: String,
    pub title: String,
    pub category: String,
    pub qty: i64,
    pub shelf: String,
}

/// The identifying codes of one unit row, as fed to the code matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCodes {
    pub fsn: Option<String>,
    pub ean: Option<String>,
    pub model_id: Option<String>,
}

/// Full ledger row. Column order matches the authoritative schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRow {
    pub owner_id: Option<String>,
    pub stn: Option<String>,
    pub tl_id: Option<String>,
    pub qty: Option<i64>,
    pub shelf: Option<String>,
    pub category: Option<String>,
    pub wid: Option<String>,
    pub fsn: Option<String>,
    pub ean: Option<String>,
    pub model_id: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub box_id: Option<String>,
    pub pick: Option<String>,
    pub tl_status: Option<String>,
    pub pack: Option<String>,
    pub consignment_id: Option<String>,
    pub dispatch: Option<String>,
}

impl UnitRow {
    pub fn tl_status(&self) -> TlStatus {
        TlStatus::from_db(self.tl_status.as_deref())
    }

    pub fn is_picked(&self) -> bool {
        self.pick.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub(crate) fn from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        Ok(UnitRow {
            owner_id: row.try_get("owner_id")?,
            stn: row.try_get("stn")?,
            tl_id: row.try_get("tl_id")?,
            qty: row.try_get("qty")?,
            shelf: row.try_get("shelf")?,
            category: row.try_get("category")?,
            wid: row.try_get("wid")?,
            fsn: row.try_get("fsn")?,
            ean: row.try_get("ean")?,
            model_id: row.try_get("model_id")?,
            source: row.try_get("source")?,
            destination: row.try_get("destination")?,
            box_id: row.try_get("box_id")?,
            pick: row.try_get("pick")?,
            tl_status: row.try_get("tl_status")?,
            pack: row.try_get("pack")?,
            consignment_id: row.try_get("consignment_id")?,
            dispatch: row.try_get("dispatch")?,
        })
    }
}

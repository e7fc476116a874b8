use thiserror::Error;

/// Typed failure taxonomy for ledger operations.
///
/// Policy (enforced by callers, not by this type):
/// - `Schema` is non-fatal after first startup — log and continue with the
///   degraded column set. Schema creation failing at first startup is the
///   one fatal case.
/// - `Resolution` halts the current step only; the operator retries.
/// - `Mismatch` means the observed completion message named a different box
///   than expected. Nothing was written.
/// - `Reorg` aborts with the original table untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("schema migration failed: {detail}")]
    Schema { detail: String },

    #[error("nothing to resolve: {what}")]
    Resolution { what: String },

    #[error("completion message names box {observed}, expected {expected}; write skipped")]
    Mismatch { expected: String, observed: String },

    #[error("ledger reorg aborted, original table preserved: {detail}")]
    Reorg { detail: String },

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

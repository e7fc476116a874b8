//! Fuzzy code matching.
//!
//! Physical barcodes and QR labels frequently encode partial or reformatted
//! codes, so a scanned token is accepted through three tiers of decreasing
//! strictness. No-match is a plain `false` — the operator retries; the
//! matcher never errors on unrecognized input.

use sqlx::SqlitePool;

use wfl_db::{ItemCodes, Result};

/// True when `scanned` matches any identifying code of any row on the
/// TL+shelf pair.
pub async fn match_any_code(
    pool: &SqlitePool,
    tl: &str,
    shelf: &str,
    scanned: &str,
) -> Result<bool> {
    let candidates = wfl_db::codes_for_tl_shelf(pool, tl, shelf).await?;
    Ok(candidates.iter().any(|c| code_matches(scanned, c)))
}

/// The three tiers, in order:
///
/// 1. case-folded equality against `fsn` / `ean` / `model_id`;
/// 2. the scanned text is a case-folded substring of one of the three;
/// 3. with dashes and spaces stripped from both sides, the scanned text and
///    `ean` contain each other (either direction).
pub fn code_matches(scanned: &str, codes: &ItemCodes) -> bool {
    let needle = scanned.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let fields = [&codes.fsn, &codes.ean, &codes.model_id];

    for field in fields.iter().filter_map(|f| f.as_deref()) {
        let folded = field.to_lowercase();
        if folded.is_empty() {
            continue;
        }
        if folded == needle || folded.contains(&needle) {
            return true;
        }
    }

    if let Some(ean) = codes.ean.as_deref() {
        let a = strip_separators(&needle);
        let b = strip_separators(&ean.to_lowercase());
        if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
            return true;
        }
    }

    false
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

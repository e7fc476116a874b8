//! Completion-message parsing and canonicalization.
//!
//! The warehouse application reports pick/pack completion as free-text
//! banners. Both write paths (scan-driven and poller-driven) extract the
//! box identifier with the same ordered patterns and store the same
//! canonical form, so replaying an observation overwrites with identical
//! bytes.

use once_cell::sync::Lazy;
use regex::Regex;

static CLOSED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:tote/box|tote|box)\s+([A-Za-z0-9][A-Za-z0-9_-]*)\s+is\s+closed\s+successfully")
        .expect("closed-banner pattern")
});

static PACKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbox\s+packed\s+with\s+id\s*-\s*([A-Za-z0-9][A-Za-z0-9_-]*)")
        .expect("packed-banner pattern")
});

// Generic fallback: any token of box shape (letters and digits mixed).
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z0-9][A-Za-z0-9_-]{3,})\b").expect("token pattern"));

/// Extract the box identifier from a completion message, trying the known
/// banner shapes in priority order before falling back to the first generic
/// alphanumeric token. Physical banners get reworded across app releases;
/// the fallback keeps old sessions working.
pub fn parse_box_id(message: &str) -> Option<String> {
    for re in [&*CLOSED_RE, &*PACKED_RE] {
        if let Some(c) = re.captures(message) {
            return Some(c[1].to_string());
        }
    }

    TOKEN_RE
        .captures_iter(message)
        .map(|c| c[1].to_string())
        .find(|t| looks_like_box_id(t))
}

fn looks_like_box_id(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit()) && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Canonical stored form: trimmed, inner whitespace collapsed to single
/// spaces.
pub fn canonicalize(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a banner opportunistically announces TL completion.
pub fn mentions_tl_complete(message: &str) -> bool {
    let folded = message.to_lowercase();
    folded.contains("tl complete") || folded.contains("tl is complete")
}

//! Pick/pack transition engine: fuzzy code matching, completion-message
//! parsing, and the session state machine driven by scan events and
//! poller-observed banners.

mod engine;
mod matcher;
mod messages;

pub use engine::{
    next_shelf_cyclic, verify_expected_box, EngineEvent, PickContext, PickSession, Stage,
    TransitionOutcome,
};
pub use matcher::{code_matches, match_any_code};
pub use messages::{canonicalize, mentions_tl_complete, parse_box_id};

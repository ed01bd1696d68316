//! Replay engine for Folio.
//!
//! Turns a [`folio_diff::DocumentDiff`] computed against an old document back
//! into transaction steps, so that applying them to the old document yields
//! the new one. Individual operations that no longer fit the document are
//! skipped with a warning instead of aborting the replay.
//!
//! # Key Types
//!
//! - [`ReplayEngine`] -- Applies node and inline diff records to a transaction
//! - [`ReplayOptions`] / [`User`] -- Tracked-changes pass-through settings
//! - [`ReplayResult`] -- The transaction plus applied/skipped counts and warnings
//! - [`ReplayError`] -- Why a single operation was skipped

pub mod engine;
pub mod error;
pub mod options;

pub use engine::{marks_from_run_attrs, ReplayEngine, ReplayResult};
pub use error::ReplayError;
pub use options::{ReplayOptions, User};

use folio_model::{SchemaError, StepError};

/// Why a single replay operation could not be applied.
///
/// These never escape a replay; each one becomes a warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("no node at position {pos}")]
    StalePosition { pos: usize },

    #[error("expected {expected} at position {pos}, found {found}")]
    TypeMismatch {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("record has no {0} payload")]
    MissingPayload(&'static str),

    #[error("expected text {expected:?} at {from}..{to}, found {found:?}")]
    TextMismatch {
        from: usize,
        to: usize,
        expected: String,
        found: String,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("step error: {0}")]
    Step(#[from] StepError),
}

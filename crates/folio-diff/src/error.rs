//! Error types for the diff crate.

/// Errors that can occur while preparing or reading a diff.
///
/// Comparing two well-formed documents never fails; only configuration
/// loading and decoding serialized records do.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The configuration source could not be parsed.
    #[error("failed to parse diff configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but holds out-of-range values.
    #[error("invalid diff configuration: {0}")]
    InvalidConfig(String),

    /// A serialized diff record is missing a field its action needs.
    #[error("invalid diff record: {0}")]
    InvalidRecord(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;

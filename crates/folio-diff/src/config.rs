use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// Minimum normalized Levenshtein similarity for pairing two text blocks.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.65;

/// Minimum text length (in characters) both blocks need before similarity
/// pairing is considered.
pub const DEFAULT_MIN_SIMILARITY_LENGTH: usize = 4;

/// Tuning knobs for document comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Similarity at or above which a deleted and an inserted text block are
    /// reported as one modified block.
    pub similarity_threshold: f64,
    /// Both texts must have at least this many characters to be paired by
    /// similarity.
    pub min_similarity_length: usize,
    /// Housekeeping attribute keys ignored at every nesting level.
    pub ignored_attributes: BTreeSet<String>,
    /// Attribute holding a text block's stable identifier.
    pub paragraph_id_attribute: String,
    /// Attribute holding the stable identifier of other blocks (table rows).
    pub row_id_attribute: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_similarity_length: DEFAULT_MIN_SIMILARITY_LENGTH,
            ignored_attributes: BTreeSet::from(["sdBlockId".to_string()]),
            paragraph_id_attribute: "paraId".into(),
            row_id_attribute: "paraId".into(),
        }
    }
}

impl DiffConfig {
    /// Load a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> DiffResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that thresholds are in range.
    pub fn validate(&self) -> DiffResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DiffError::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }

    /// Whether an attribute key is housekeeping.
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_attributes.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DiffConfig::default();
        assert_eq!(config.similarity_threshold, 0.65);
        assert_eq!(config.min_similarity_length, 4);
        assert!(config.is_ignored("sdBlockId"));
        assert!(!config.is_ignored("paraId"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_keep_other_defaults() {
        let config = DiffConfig::from_toml_str(
            r#"
            similarity_threshold = 0.8
            ignored_attributes = ["sdBlockId", "rsid"]
            "#,
        )
        .unwrap();
        assert_eq!(config.similarity_threshold, 0.8);
        assert!(config.is_ignored("rsid"));
        assert_eq!(config.min_similarity_length, 4);
        assert_eq!(config.paragraph_id_attribute, "paraId");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(DiffConfig::from_toml_str("").unwrap(), DiffConfig::default());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = DiffConfig::from_toml_str("similarity_threshold = 1.5").unwrap_err();
        assert!(matches!(err, DiffError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = DiffConfig::from_toml_str("similarity_threshold = ").unwrap_err();
        assert!(matches!(err, DiffError::ConfigParse(_)));
    }
}

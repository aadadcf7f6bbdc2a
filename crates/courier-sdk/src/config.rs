use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// How the factory handles content too large for one envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LargeContent {
    /// Split into multipart part envelopes.
    Chunk,
    /// Fail with a validation error.
    Reject,
}

/// Deployment configuration for a [`Courier`] facade.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration.
///
/// [`Courier`]: crate::courier::Courier
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Serialized envelope size limit in bytes.
    pub max_envelope_size: u64,
    /// Content bytes per multipart chunk.
    pub max_part_size: usize,
    /// Key prefix for cache-backed stores.
    pub cache_key_prefix: String,
    /// Name of the composite member that receives writes.
    pub default_store: String,
    pub large_content: LargeContent,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            max_envelope_size: 1000,
            max_part_size: 800,
            cache_key_prefix: "courier".into(),
            default_store: "cache".into(),
            large_content: LargeContent::Chunk,
        }
    }
}

impl CourierConfig {
    /// Parse a TOML document, filling omitted fields from defaults.
    pub fn from_toml_str(raw: &str) -> SdkResult<Self> {
        toml::from_str(raw).map_err(|e| SdkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = CourierConfig::default();
        assert_eq!(c.max_envelope_size, 1000);
        assert_eq!(c.max_part_size, 800);
        assert_eq!(c.cache_key_prefix, "courier");
        assert_eq!(c.default_store, "cache");
        assert_eq!(c.large_content, LargeContent::Chunk);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let c = CourierConfig::from_toml_str("").unwrap();
        assert_eq!(c.max_envelope_size, 1000);
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let c = CourierConfig::from_toml_str(
            r#"
            max_envelope_size = 4096
            large_content = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(c.max_envelope_size, 4096);
        assert_eq!(c.large_content, LargeContent::Reject);
        assert_eq!(c.default_store, "cache");
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = CourierConfig::from_toml_str("max_envelope_size = \"huge\"").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }
}

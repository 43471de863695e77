use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What to do when an entity already carries the new key with a
/// different value than the one being moved onto it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Overwrite the existing value, log a warning, and keep the old value
    /// in the outcome record.
    #[default]
    Overwrite,
    /// Leave the entity alone and report a conflict.
    Skip,
}

/// Where the engine reads an entity's tags from before deciding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    /// The tag set captured when the entity was selected.
    #[default]
    Snapshot,
    /// A fresh `read_tags` call right before the entity is processed.
    Live,
}

/// Engine tuning knobs. Every field has a default, so an empty TOML
/// section deserializes to [`EngineConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of entities processed at the same time. Keep this
    /// below the tag store's rate limit.
    pub concurrency: usize,
    pub collision: CollisionPolicy,
    pub tag_source: TagSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            collision: CollisionPolicy::default(),
            tag_source: TagSource::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.collision, CollisionPolicy::Overwrite);
        assert_eq!(config.tag_source, TagSource::Snapshot);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = EngineConfig {
            concurrency: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"collision": "skip"}"#).unwrap();
        assert_eq!(config.collision, CollisionPolicy::Skip);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.tag_source, TagSource::Snapshot);
    }
}

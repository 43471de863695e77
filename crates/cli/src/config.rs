//! `retag.toml` configuration.
//!
//! Every section and field is optional.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! concurrency = 8           # entities processed at once
//! collision = "overwrite"   # or "skip"
//! tag_source = "snapshot"   # or "live"
//!
//! [logging]
//! format = "pretty"         # or "json"
//! level = "warn"            # RUST_LOG takes precedence
//! ```

use std::path::Path;

use retag_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable, multi-line events.
    #[default]
    Pretty,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "warn".to_string(),
        }
    }
}

/// Read and parse a config TOML file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse_config(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse_config(content: &str) -> Result<Config, String> {
    let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
    config.engine.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retag_engine::{CollisionPolicy, TagSource};

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn full_file_parses() {
        let config = parse_config(
            r#"
            [engine]
            concurrency = 2
            collision = "skip"
            tag_source = "live"

            [logging]
            format = "json"
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.concurrency, 2);
        assert_eq!(config.engine.collision, CollisionPolicy::Skip);
        assert_eq!(config.engine.tag_source, TagSource::Live);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn zero_concurrency_is_an_error() {
        let err = parse_config("[engine]\nconcurrency = 0\n").unwrap_err();
        assert!(err.contains("concurrency"), "{err}");
    }

    #[test]
    fn unknown_section_is_an_error() {
        assert!(parse_config("[engines]\nconcurrency = 2\n").is_err());
    }

    #[test]
    fn read_config_reports_missing_file() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.starts_with("could not read"), "{err}");
    }
}

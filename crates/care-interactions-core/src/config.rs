//! Engine configuration loaded from TOML.
//!
//! ```toml
//! region = "ENGLAND"
//! care_home_type = "CHILDREN"
//! database_path = "/var/lib/care/interactions.db"
//! pair_cache_ttl_hours = 12
//! allergy_cache_ttl_hours = 24
//! similarity_threshold = 0.75
//! require_regional_checks = false
//!
//! [sources]
//! bnf_path = "data/bnf.json"
//! ```
//!
//! Every field has a default, so an empty document is a valid adult-home
//! configuration for England with an in-memory database.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CareHomeType, Region};
use crate::services::{InteractionError, ALLERGY_CACHE_TTL_HOURS, PAIR_CACHE_TTL_HOURS, SIMILARITY_THRESHOLD};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config TOML: {0}")]
    Parse(String),

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl From<ConfigError> for InteractionError {
    fn from(e: ConfigError) -> Self {
        InteractionError::Config(e.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Longest accepted cache lifetime (one year).
pub const MAX_CACHE_TTL_HOURS: i64 = 24 * 366;

/// Optional JSON data files replacing the built-in reference data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub bnf_path: Option<PathBuf>,
    pub nice_path: Option<PathBuf>,
    pub bnf_patterns_path: Option<PathBuf>,
    pub drugbank_patterns_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub region: String,
    pub care_home_type: String,
    /// SQLite file; in memory when unset
    pub database_path: Option<PathBuf>,
    pub pair_cache_ttl_hours: i64,
    pub allergy_cache_ttl_hours: i64,
    pub similarity_threshold: f64,
    /// Fail a check when the regional regulator cannot be reached
    pub require_regional_checks: bool,
    pub sources: SourcePaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region: Region::England.as_str().to_string(),
            care_home_type: CareHomeType::Adult.as_str().to_string(),
            database_path: None,
            pair_cache_ttl_hours: PAIR_CACHE_TTL_HOURS,
            allergy_cache_ttl_hours: ALLERGY_CACHE_TTL_HOURS,
            similarity_threshold: SIMILARITY_THRESHOLD,
            require_regional_checks: false,
            sources: SourcePaths::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.parsed_region()?;
        self.parsed_care_home_type()?;
        check_ttl("pair_cache_ttl_hours", self.pair_cache_ttl_hours)?;
        check_ttl("allergy_cache_ttl_hours", self.allergy_cache_ttl_hours)?;
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid {
                field: "similarity_threshold",
                message: format!("must be between 0 and 1, got {}", self.similarity_threshold),
            });
        }
        Ok(())
    }

    pub fn parsed_region(&self) -> ConfigResult<Region> {
        Region::parse(&self.region).ok_or_else(|| ConfigError::Invalid {
            field: "region",
            message: format!("unknown region '{}'", self.region),
        })
    }

    pub fn parsed_care_home_type(&self) -> ConfigResult<CareHomeType> {
        CareHomeType::parse(&self.care_home_type).ok_or_else(|| ConfigError::Invalid {
            field: "care_home_type",
            message: format!("unknown care home type '{}'", self.care_home_type),
        })
    }

    /// Pair cache lifetime, clamped to `1..=MAX_CACHE_TTL_HOURS`.
    pub fn pair_cache_ttl(&self) -> Duration {
        ttl(self.pair_cache_ttl_hours)
    }

    /// Allergy cache lifetime, clamped to `1..=MAX_CACHE_TTL_HOURS`.
    pub fn allergy_cache_ttl(&self) -> Duration {
        ttl(self.allergy_cache_ttl_hours)
    }
}

fn check_ttl(field: &'static str, hours: i64) -> ConfigResult<()> {
    if !(1..=MAX_CACHE_TTL_HOURS).contains(&hours) {
        return Err(ConfigError::Invalid {
            field,
            message: format!("must be between 1 and {} hours, got {}", MAX_CACHE_TTL_HOURS, hours),
        });
    }
    Ok(())
}

fn ttl(hours: i64) -> Duration {
    Duration::hours(hours.clamp(1, MAX_CACHE_TTL_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.pair_cache_ttl(), Duration::hours(12));
        assert_eq!(config.allergy_cache_ttl(), Duration::hours(24));
        assert_eq!(config.parsed_region().unwrap(), Region::England);
    }

    #[test]
    fn test_full_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            region = "northern-ireland"
            care_home_type = "children"
            pair_cache_ttl_hours = 6
            require_regional_checks = true

            [sources]
            bnf_path = "data/bnf.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.parsed_region().unwrap(), Region::NorthernIreland);
        assert_eq!(config.parsed_care_home_type().unwrap(), CareHomeType::Children);
        assert_eq!(config.pair_cache_ttl_hours, 6);
        assert_eq!(config.allergy_cache_ttl_hours, 24);
        assert!(config.require_regional_checks);
        assert_eq!(config.sources.bnf_path, Some(PathBuf::from("data/bnf.json")));
        assert_eq!(config.sources.nice_path, None);
    }

    #[test]
    fn test_unknown_region_rejected() {
        let err = EngineConfig::from_toml_str(r#"region = "Atlantis""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "region", .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("pair_cache_ttl_hours = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pair_cache_ttl_hours", .. }));

        let err = EngineConfig::from_toml_str("allergy_cache_ttl_hours = -3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "allergy_cache_ttl_hours", .. }));

        let err = EngineConfig::from_toml_str("similarity_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "similarity_threshold", .. }));

        let err = EngineConfig::from_toml_str("region = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let err = EngineConfig::from_toml_str("pair_cache_ttl_hours = 9223372036854775807").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pair_cache_ttl_hours", .. }));

        // Unvalidated values are clamped rather than overflowing
        let config = EngineConfig {
            pair_cache_ttl_hours: i64::MAX,
            allergy_cache_ttl_hours: i64::MIN,
            ..EngineConfig::default()
        };
        assert_eq!(config.pair_cache_ttl(), Duration::hours(MAX_CACHE_TTL_HOURS));
        assert_eq!(config.allergy_cache_ttl(), Duration::hours(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"region = "WALES""#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.parsed_region().unwrap(), Region::Wales);

        let err = EngineConfig::load(Path::new("/nonexistent/care.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_config_error_maps_to_interaction_error() {
        let err: InteractionError = ConfigError::Parse("bad".into()).into();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}

// Engine Configuration
//
// *La Configuration* (The Configuration) - Fusion weights and scan tuning from TOML or environment

use crate::error::{Error, Result};
use crate::ranking::validate_weight;
use crate::vector::{ScanStrategy, DEFAULT_PARALLEL_THRESHOLD};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Default weight of the semantic signal
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;

/// Default number of results
pub const DEFAULT_TOP_K: usize = 5;

/// Default semantic over-fetch factor
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 2;

/// Engine configuration
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// semantic_weight = 0.5
///
/// [scan]
/// strategy = "parallel"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weight of the semantic signal; the keyword weight is `1 - semantic_weight`
    pub semantic_weight: f32,

    /// Number of results when a query does not say
    pub default_top_k: usize,

    /// Semantic candidates fetched per requested result
    pub candidate_multiplier: usize,

    /// Vector scan tuning
    pub scan: ScanConfig,
}

/// Vector scan configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan strategy
    pub strategy: ScanStrategy,

    /// Corpus size from which `auto` scans in parallel
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            default_top_k: DEFAULT_TOP_K,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            scan: ScanConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: ScanStrategy::Auto,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Pure vector search, no keyword contribution
    pub fn vector_only() -> Self {
        Self {
            semantic_weight: 1.0,
            ..Self::default()
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file: {:?}", path))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).context("Failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Defaults overlaid with environment variables
    ///
    /// Environment variables:
    /// - `LEHYBRIDE_SEMANTIC_WEIGHT` - Semantic weight in `[0, 1]`
    /// - `LEHYBRIDE_TOP_K` - Default number of results
    /// - `LEHYBRIDE_CANDIDATE_MULTIPLIER` - Semantic over-fetch factor
    /// - `LEHYBRIDE_SCAN_STRATEGY` - `sequential`, `parallel` or `auto`
    ///
    /// Unparseable or out-of-range values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup (the environment, in `from_env`)
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LEHYBRIDE_SEMANTIC_WEIGHT") {
            match raw.trim().parse::<f32>().map(validate_weight) {
                Ok(Ok(weight)) => self.semantic_weight = weight,
                _ => warn!(value = %raw, "Ignoring invalid LEHYBRIDE_SEMANTIC_WEIGHT"),
            }
        }

        if let Some(raw) = lookup("LEHYBRIDE_TOP_K") {
            match raw.trim().parse::<usize>() {
                Ok(top_k) if top_k > 0 => self.default_top_k = top_k,
                _ => warn!(value = %raw, "Ignoring invalid LEHYBRIDE_TOP_K"),
            }
        }

        if let Some(raw) = lookup("LEHYBRIDE_CANDIDATE_MULTIPLIER") {
            match raw.trim().parse::<usize>() {
                Ok(multiplier) if multiplier > 0 => self.candidate_multiplier = multiplier,
                _ => warn!(value = %raw, "Ignoring invalid LEHYBRIDE_CANDIDATE_MULTIPLIER"),
            }
        }

        if let Some(raw) = lookup("LEHYBRIDE_SCAN_STRATEGY") {
            match raw.trim().to_lowercase().as_str() {
                "sequential" => self.scan.strategy = ScanStrategy::Sequential,
                "parallel" => self.scan.strategy = ScanStrategy::Parallel,
                "auto" => self.scan.strategy = ScanStrategy::Auto,
                _ => warn!(value = %raw, "Ignoring invalid LEHYBRIDE_SCAN_STRATEGY"),
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_weight(self.semantic_weight)?;

        if self.default_top_k == 0 {
            return Err(Error::Config(
                "default_top_k must be greater than zero".to_string(),
            ));
        }

        if self.candidate_multiplier == 0 {
            return Err(Error::Config(
                "candidate_multiplier must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.semantic_weight, 0.7);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.candidate_multiplier, 2);
        assert_eq!(config.scan.strategy, ScanStrategy::Auto);
        assert_eq!(config.scan.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vector_only() {
        assert_eq!(EngineConfig::vector_only().semantic_weight, 1.0);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            semantic_weight = 0.5

            [scan]
            strategy = "parallel"
            "#,
        )
        .unwrap();

        assert_eq!(config.semantic_weight, 0.5);
        assert_eq!(config.default_top_k, DEFAULT_TOP_K);
        assert_eq!(config.scan.strategy, ScanStrategy::Parallel);
        assert_eq!(config.scan.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_toml_rejects_invalid_weight() {
        let err = EngineConfig::from_toml_str("semantic_weight = 1.5").unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid semantic weight"));
    }

    #[test]
    fn test_toml_rejects_unknown_strategy() {
        assert!(EngineConfig::from_toml_str("[scan]\nstrategy = \"gpu\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lehybride.toml");

        let config = EngineConfig {
            semantic_weight: 0.25,
            default_top_k: 8,
            candidate_multiplier: 4,
            scan: ScanConfig {
                strategy: ScanStrategy::Sequential,
                parallel_threshold: 10,
            },
        };
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = EngineConfig::load(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_overrides_apply() {
        let config = EngineConfig::default().with_overrides(lookup(&[
            ("LEHYBRIDE_SEMANTIC_WEIGHT", "0.4"),
            ("LEHYBRIDE_TOP_K", "3"),
            ("LEHYBRIDE_CANDIDATE_MULTIPLIER", "5"),
            ("LEHYBRIDE_SCAN_STRATEGY", "Sequential"),
        ]));

        assert_eq!(config.semantic_weight, 0.4);
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.candidate_multiplier, 5);
        assert_eq!(config.scan.strategy, ScanStrategy::Sequential);
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let config = EngineConfig::default().with_overrides(lookup(&[
            ("LEHYBRIDE_SEMANTIC_WEIGHT", "2.0"),
            ("LEHYBRIDE_TOP_K", "0"),
            ("LEHYBRIDE_CANDIDATE_MULTIPLIER", "many"),
            ("LEHYBRIDE_SCAN_STRATEGY", "gpu"),
        ]));

        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let config = EngineConfig {
            default_top_k: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = EngineConfig {
            candidate_multiplier: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}

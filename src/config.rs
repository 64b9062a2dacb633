use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::{MAX_TIER, MIN_TIER};
use crate::engine::selector::SelectorConfig;
use crate::engine::trend::TrendConfig;
use crate::engine::weakness::WeaknessConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_language")]
    pub language: String,
    /// Opt-in: let weak symbol groups nudge snippet selection.
    #[serde(default = "default_weakness_bias_enabled")]
    pub weakness_bias_enabled: bool,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
    /// Forces every session to this tier when set.
    #[serde(default)]
    pub manual_difficulty: Option<u8>,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub weakness: WeaknessConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
}

fn default_language() -> String {
    "rust".to_string()
}
fn default_weakness_bias_enabled() -> bool {
    false
}
fn default_snapshot_interval() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            weakness_bias_enabled: default_weakness_bias_enabled(),
            snapshot_interval: default_snapshot_interval(),
            manual_difficulty: None,
            trend: TrendConfig::default(),
            weakness: WeaknessConfig::default(),
            selector: SelectorConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snipdrill")
            .join("config.toml")
    }

    /// Lowercased name with common aliases mapped (`py` -> `python`).
    pub fn canonical_language(name: &str) -> String {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "rs" => "rust".to_string(),
            "py" => "python".to_string(),
            "js" => "javascript".to_string(),
            "golang" => "go".to_string(),
            _ => lowered,
        }
    }

    /// Canonicalize `language`, falling back to the default when it is not
    /// one of `valid_keys`.
    pub fn normalize_language(&mut self, valid_keys: &[&str]) {
        self.language = Self::canonical_language(&self.language);
        if !valid_keys.contains(&self.language.as_str()) {
            self.language = default_language();
        }
    }

    /// Clamp values a hand-edited file could get wrong.
    pub fn validate(&mut self) {
        self.manual_difficulty = self
            .manual_difficulty
            .filter(|d| (MIN_TIER..=MAX_TIER).contains(d));
        self.snapshot_interval = self.snapshot_interval.max(1);
        self.selector.top_k = self.selector.top_k.max(1);
        if !self.selector.jitter.is_finite() || self.selector.jitter < 0.0 {
            self.selector.jitter = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.weakness_bias_enabled);
        assert_eq!(config.snapshot_interval, 5);
        assert_eq!(config.trend.direction_threshold, 0.03);
        assert_eq!(config.weakness.relative_threshold, 0.10);
        assert_eq!(config.selector.top_k, 5);
    }

    #[test]
    fn test_config_partial_nested_table() {
        let toml_str = r#"
language = "go"
weakness_bias_enabled = true

[trend]
plateau_band = 0.08
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.language, "go");
        assert!(config.weakness_bias_enabled);
        assert_eq!(config.trend.plateau_band, 0.08);
        // Siblings in the same table keep their defaults
        assert_eq!(config.trend.min_sessions, 5);
        assert_eq!(config.selector, SelectorConfig::default());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let mut config = Config::default();
        config.manual_difficulty = Some(4);
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_normalize_language() {
        let valid_keys = ["rust", "python", "javascript", "go"];
        let mut config = Config::default();
        config.language = " Python ".to_string();
        config.normalize_language(&valid_keys);
        assert_eq!(config.language, "python");

        config.language = "js".to_string();
        config.normalize_language(&valid_keys);
        assert_eq!(config.language, "javascript");

        config.language = "haskell".to_string();
        config.normalize_language(&valid_keys);
        assert_eq!(config.language, "rust");
    }

    #[test]
    fn test_validate_clamps_values() {
        let mut config = Config::default();
        config.manual_difficulty = Some(9);
        config.snapshot_interval = 0;
        config.selector.top_k = 0;
        config.selector.jitter = -1.0;
        config.validate();
        assert_eq!(config.manual_difficulty, None);
        assert_eq!(config.snapshot_interval, 1);
        assert_eq!(config.selector.top_k, 1);
        assert_eq!(config.selector.jitter, 0.0);
    }
}

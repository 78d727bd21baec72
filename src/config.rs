//! Application configuration
//!
//! Search order:
//! 1. `$WIREROD_CONFIG`
//! 2. `./wirerod.toml`
//! 3. Built-in defaults
//!
//! `API_HOST`, `API_PORT` and `MODEL_DIR` then override the file values, and
//! command-line flags override both.

use crate::error::{Result, WireRodError};
use crate::quality::QualityConfig;
use crate::server::ServerConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "WIREROD_CONFIG";
pub const LOCAL_CONFIG: &str = "wirerod.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `model.json` and `scaler.json`
    pub model_dir: PathBuf,
    pub training: TrainingConfig,
    pub quality: QualityConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            training: TrainingConfig::default(),
            quality: QualityConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load using the standard search order, then apply environment overrides.
    ///
    /// A file that exists but does not parse or validate is an error; a
    /// missing file falls through to the next source.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file_or_default()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file_or_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV);
                return Ok(config);
            }
            warn!(path = %path, "{} points to a non-existent file, falling back", CONFIG_ENV);
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./{}", LOCAL_CONFIG);
            return Ok(config);
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG);
        Ok(Self::default())
    }

    /// Load from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WireRodError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents)
            .map_err(|e| WireRodError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| WireRodError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WireRodError::SerializationError(e.to_string()))
    }

    /// Apply `API_HOST`, `API_PORT` and `MODEL_DIR` from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                WireRodError::ConfigError(format!("API_PORT is not a valid port: '{}'", port))
            })?;
        }
        if let Some(dir) = lookup("MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.quality.validate()?;
        if self.server.host.trim().is_empty() {
            return Err(WireRodError::ConfigError("server.host must not be empty".to_string()));
        }
        if self.model_dir.as_os_str().is_empty() {
            return Err(WireRodError::ConfigError("model_dir must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::PolicyKind;
    use crate::training::MaxFeatures;
    use std::collections::HashMap;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            model_dir = "/srv/wirerod"

            [training]
            n_estimators = 50

            [quality]
            policy = "floor"
            floors = { uts = 190.0, elongation = 14.0, conductivity = 61.0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/srv/wirerod"));
        assert_eq!(config.training.n_estimators, 50);
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.quality.policy, PolicyKind::Floor);
        assert_eq!(config.quality.floors.uts, 190.0);
    }

    #[test]
    fn test_forest_knobs_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            [training]
            max_features = "sqrt"
            bootstrap = false
            "#,
        )
        .unwrap();
        assert_eq!(config.training.max_features, MaxFeatures::Sqrt);
        assert!(!config.training.bootstrap);

        let config =
            AppConfig::from_toml("[training]\nmax_features = { fraction = 0.5 }").unwrap();
        assert_eq!(config.training.max_features, MaxFeatures::Fraction(0.5));

        assert!(AppConfig::from_toml("[training]\nmax_features = { fixed = 0 }").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml("[training]\ntest_size = 0.0").is_err());
        assert!(AppConfig::from_toml("[quality]\npolicy = \"median\"").is_err());
        assert!(AppConfig::from_toml("[training\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9090"),
            ("MODEL_DIR", "/tmp/models"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.model_dir, PathBuf::from("/tmp/models"));
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|key| (key == "API_PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }
}

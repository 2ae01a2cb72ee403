//! TOML-backed router configuration.
//!
//! ```toml
//! bus_name = "travel"
//! default_delivery = "async"
//!
//! [[resources]]
//! name = "flights"
//! version = "2.1"
//!
//! [[resources]]
//! name = "hotels"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::framework::DeliveryMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Name of the system bus.
    pub bus_name: String,
    /// Mode used when the system forwards bus traffic into mounted resources.
    pub default_delivery: DeliveryMode,
    /// Resources mounted when the system starts.
    pub resources: Vec<ResourceConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bus_name: "default".to_string(),
            default_delivery: DeliveryMode::Sync,
            resources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl RouterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = RouterConfig::from_toml_str(
            r#"
            bus_name = "travel"
            default_delivery = "async"

            [[resources]]
            name = "flights"
            version = "2.1"

            [[resources]]
            name = "hotels"
            "#,
        )
        .unwrap();

        assert_eq!(config.bus_name, "travel");
        assert_eq!(config.default_delivery, DeliveryMode::Async);
        assert_eq!(
            config.resources,
            vec![
                ResourceConfig { name: "flights".into(), version: "2.1".into() },
                ResourceConfig { name: "hotels".into(), version: "1.0".into() },
            ]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(RouterConfig::from_toml_str("").unwrap(), RouterConfig::default());
    }

    #[test]
    fn test_bad_mode_is_rejected() {
        let err = RouterConfig::from_toml_str(r#"default_delivery = "sometimes""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RouterConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! YAML server configuration.
//!
//! Everything has a default; a config file is only needed to move the listen
//! address or to match a different directive marker / header naming scheme
//! on the CDN test harness side.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Marker character delimiting directive commands inside path segments,
    /// query parameters, and directive-header values.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Multi-value header scanned for comma-separated directive commands.
    #[serde(default = "default_directive_header")]
    pub directive_header: String,
    /// Header whose value is copied verbatim as the Cache-Control override.
    #[serde(default = "default_cache_control_header")]
    pub cache_control_header: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_marker() -> String {
    "*".to_string()
}

fn default_directive_header() -> String {
    "fount-directive".to_string()
}

fn default_cache_control_header() -> String {
    "fount-cache-control".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            marker: default_marker(),
            directive_header: default_directive_header(),
            cache_control_header: default_cache_control_header(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.marker()?;
        Ok(config)
    }

    /// The validated marker character.
    pub fn marker(&self) -> Result<char, ConfigError> {
        let mut chars = self.engine.marker.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() && c != '.' => Ok(c),
            _ => Err(ConfigError::BadMarker(self.engine.marker.clone())),
        }
    }
}

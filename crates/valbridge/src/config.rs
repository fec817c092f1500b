// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshalling context configuration.
//!
//! Supports both programmatic and file-based configuration:
//!
//! ```toml
//! platform_name = "android"
//!
//! [dispatch]
//! worker_queue = true
//! queue_name = "valbridge-worker"
//! queue_capacity = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Context configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarshallingConfig {
    /// Name of the host platform, used in logs.
    #[serde(default = "default_platform_name")]
    pub platform_name: String,

    /// Call queue settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Worker queue used for promise-returning and worker-attributed functions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Spawn a worker queue.
    #[serde(default)]
    pub worker_queue: bool,

    /// Worker thread name.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Maximum queued tasks (0 = unbounded).
    #[serde(default)]
    pub queue_capacity: usize,
}

fn default_platform_name() -> String {
    "host".to_string()
}

fn default_queue_name() -> String {
    "valbridge-worker".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_queue: false,
            queue_name: default_queue_name(),
            queue_capacity: 0,
        }
    }
}

impl Default for MarshallingConfig {
    fn default() -> Self {
        Self {
            platform_name: default_platform_name(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl MarshallingConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Enable the worker queue.
    #[must_use]
    pub fn with_worker_queue(mut self, name: &str, capacity: usize) -> Self {
        self.dispatch.worker_queue = true;
        self.dispatch.queue_name = name.to_string();
        self.dispatch.queue_capacity = capacity;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platform_name.trim().is_empty() {
            return Err(ConfigError::Invalid("platform_name must not be empty".into()));
        }
        if self.dispatch.worker_queue && self.dispatch.queue_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.queue_name must not be empty when worker_queue is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MarshallingConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, MarshallingConfig::default());
        assert_eq!(config.platform_name, "host");
        assert!(!config.dispatch.worker_queue);
    }

    #[test]
    fn test_parse_dispatch_section() {
        let config = MarshallingConfig::from_toml_str(
            r#"
            platform_name = "ios"

            [dispatch]
            worker_queue = true
            queue_name = "bridge"
            queue_capacity = 128
            "#,
        )
        .expect("parse");

        assert_eq!(config.platform_name, "ios");
        assert!(config.dispatch.worker_queue);
        assert_eq!(config.dispatch.queue_name, "bridge");
        assert_eq!(config.dispatch.queue_capacity, 128);
    }

    #[test]
    fn test_validation() {
        let mut config = MarshallingConfig::default();
        assert!(config.validate().is_ok());

        config.platform_name = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = MarshallingConfig::default().with_worker_queue("", 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = MarshallingConfig::from_toml_str("platform_name = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));

        let err = MarshallingConfig::from_toml_str("[dispatch]\nqueue_capacity = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "platform_name = \"android\"").expect("write");
        writeln!(file, "[dispatch]\nworker_queue = true").expect("write");

        let config = MarshallingConfig::from_file(file.path()).expect("load");
        assert_eq!(config.platform_name, "android");
        assert!(config.dispatch.worker_queue);
        assert_eq!(config.dispatch.queue_name, "valbridge-worker");

        let missing = MarshallingConfig::from_file("/nonexistent/valbridge.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}

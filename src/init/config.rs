// SPDX-License-Identifier: Apache-2.0

//! JSON configuration file model.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::harvest::{Error, HarvestConfig, Result};

/// Typed plugin descriptor: `{ "type": "...", "settings": { ... } }`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PluginConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub settings: serde_json::Value,
}

impl PluginConfig {
    /// A descriptor without a type or settings counts as not configured
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() || self.settings.is_null()
    }
}

/// Agent configuration as read from disk
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Glob patterns of files to harvest
    pub input: Vec<String>,
    pub filter: PluginConfig,
    pub output: PluginConfig,
    /// Seconds a worker sleeps when its file has no new data
    #[serde(alias = "harvest_inteval")]
    pub harvest_interval: u64,
    /// Seconds between registry dumps and discovery passes
    #[serde(alias = "dump_inteval")]
    pub dump_interval: u64,
    pub discover: bool,
    pub registry_path: PathBuf,
    /// Seconds after which an untouched registry entry is dropped
    pub registry_ttl: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            filter: PluginConfig::default(),
            output: PluginConfig::default(),
            harvest_interval: 1,
            dump_interval: 30,
            discover: true,
            registry_path: PathBuf::from("registry"),
            registry_ttl: 15 * 86_400,
        }
    }
}

impl Config {
    /// Read and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input.is_empty() {
            return Err("input must list at least one glob pattern".to_string());
        }
        for pattern in &self.input {
            glob::Pattern::new(pattern)
                .map_err(|e| format!("invalid input pattern {:?}: {}", pattern, e))?;
        }

        if self.output.is_empty() {
            return Err("output must be configured".to_string());
        }

        if self.harvest_interval == 0 {
            return Err("harvest_interval must be greater than zero".to_string());
        }
        if self.dump_interval == 0 {
            return Err("dump_interval must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            include: self.input.clone(),
            harvest_interval: Duration::from_secs(self.harvest_interval),
            dump_interval: Duration::from_secs(self.dump_interval),
            discover: self.discover,
            registry_path: self.registry_path.clone(),
            registry_ttl: Duration::from_secs(self.registry_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "input": ["/var/log/*.log"],
        "output": {"type": "udp", "settings": {"address": "127.0.0.1:5140"}}
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.input, vec!["/var/log/*.log"]);
        assert_eq!(config.output.kind, "udp");
        assert!(config.filter.is_empty());
        assert_eq!(config.harvest_interval, 1);
        assert_eq!(config.dump_interval, 30);
        assert!(config.discover);
        assert_eq!(config.registry_path, PathBuf::from("registry"));
        assert_eq!(config.registry_ttl, 1_296_000);
    }

    #[test]
    fn test_all_fields() {
        let raw = r#"{
            "input": ["/a/*.log", "/b/*.txt"],
            "filter": {"type": "regex", "settings": {"pattern": "ERROR"}},
            "output": {"type": "udp", "settings": {"address": "localhost:9000"}},
            "harvest_interval": 2,
            "dump_interval": 10,
            "discover": false,
            "registry_path": "/var/lib/tailhaul/registry",
            "registry_ttl": 60
        }"#;
        let config = Config::from_json(raw).unwrap();
        assert_eq!(config.filter.kind, "regex");
        assert_eq!(config.filter.settings["pattern"], "ERROR");

        let harvest = config.harvest_config();
        assert_eq!(harvest.include.len(), 2);
        assert_eq!(harvest.harvest_interval, Duration::from_secs(2));
        assert_eq!(harvest.dump_interval, Duration::from_secs(10));
        assert!(!harvest.discover);
        assert_eq!(
            harvest.registry_path,
            PathBuf::from("/var/lib/tailhaul/registry")
        );
        assert_eq!(harvest.registry_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_misspelled_interval_keys_accepted() {
        let raw = r#"{
            "input": ["*.log"],
            "output": {"type": "udp", "settings": {"address": "127.0.0.1:1"}},
            "harvest_inteval": 5,
            "dump_inteval": 7
        }"#;
        let config = Config::from_json(raw).unwrap();
        assert_eq!(config.harvest_interval, 5);
        assert_eq!(config.dump_interval, 7);
    }

    #[test]
    fn test_missing_input_rejected() {
        let raw = r#"{"output": {"type": "udp", "settings": {"address": "127.0.0.1:1"}}}"#;
        assert!(matches!(Config::from_json(raw), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_output_rejected() {
        let raw = r#"{"input": ["*.log"]}"#;
        assert!(matches!(Config::from_json(raw), Err(Error::Config(_))));

        let raw = r#"{"input": ["*.log"], "output": {"type": "udp"}}"#;
        assert!(matches!(Config::from_json(raw), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let raw = r#"{
            "input": ["/var/log/[.log"],
            "output": {"type": "udp", "settings": {"address": "127.0.0.1:1"}}
        }"#;
        assert!(matches!(Config::from_json(raw), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let raw = r#"{
            "input": ["*.log"],
            "output": {"type": "udp", "settings": {"address": "127.0.0.1:1"}},
            "dump_interval": 0
        }"#;
        assert!(matches!(Config::from_json(raw), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Config::from_json("{\"input\": "),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.output.settings["address"], "127.0.0.1:5140");
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::from_file(dir.path().join("config.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

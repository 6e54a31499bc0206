// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for the harvester.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the harvest coordinator and its workers
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Glob patterns for files to harvest
    pub include: Vec<String>,
    /// How long a worker sleeps when its file has no new data
    pub harvest_interval: Duration,
    /// Period of registry dumps and re-discovery
    pub dump_interval: Duration,
    /// Re-scan the globs for new files on every dump tick
    pub discover: bool,
    /// Path of the offset registry file
    pub registry_path: PathBuf,
    /// Entries not updated for this long are dropped from the registry
    pub registry_ttl: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            harvest_interval: Duration::from_secs(1),
            dump_interval: Duration::from_secs(30),
            discover: true,
            registry_path: PathBuf::from("registry"),
            registry_ttl: Duration::from_secs(15 * 86_400),
        }
    }
}

impl HarvestConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.include.is_empty() {
            return Err("At least one input pattern must be specified".to_string());
        }

        if self.harvest_interval.is_zero() {
            return Err("Harvest interval must be greater than zero".to_string());
        }

        if self.dump_interval.is_zero() {
            return Err("Dump interval must be greater than zero".to_string());
        }

        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0

use glob::glob;
use std::collections::HashSet;
use std::path::PathBuf;

use tracing::warn;

use super::error::{Error, Result};

/// FileFinder expands the configured glob patterns into concrete file paths
#[derive(Debug, Clone)]
pub struct FileFinder {
    include: Vec<String>,
}

impl FileFinder {
    /// Create a new FileFinder, rejecting patterns that do not compile
    pub fn new(include: Vec<String>) -> Result<Self> {
        for pattern in &include {
            glob::Pattern::new(pattern)
                .map_err(|e| Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
        }
        Ok(Self { include })
    }

    pub fn patterns(&self) -> &[String] {
        &self.include
    }

    /// Find all non-directory paths matching any pattern, without duplicates.
    ///
    /// Unreadable matches are logged and skipped; a pattern that matches
    /// nothing simply contributes no paths.
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();

        for pattern in &self.include {
            // patterns are validated in new()
            let Ok(matches) = glob(pattern) else {
                continue;
            };

            for entry in matches {
                let path = match entry {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Failed to read glob match");
                        continue;
                    }
                };

                // is_dir() is false for paths that vanished meanwhile; those
                // fail later when opened
                if path.is_dir() {
                    continue;
                }

                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }

        paths
    }
}

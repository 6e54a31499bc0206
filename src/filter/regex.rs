// SPDX-License-Identifier: Apache-2.0

use regex::bytes::Regex;
use serde::Deserialize;

use super::Filter;
use crate::harvest::error::{Error, Result};

/// Settings payload of a `regex` filter descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct RegexFilterSettings {
    pub pattern: String,
}

/// Accepts lines containing a match of the pattern anywhere.
///
/// Matching works on bytes, so lines that are not valid UTF-8 can still match.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Regex(format!("invalid regex pattern: {}", e)))?;
        Ok(Self { regex })
    }

    pub fn from_settings(settings: RegexFilterSettings) -> Result<Self> {
        Self::new(&settings.pattern)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl Filter for RegexFilter {
    fn accept(&self, line: &[u8]) -> bool {
        self.regex.is_match(line)
    }
}

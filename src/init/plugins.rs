// SPDX-License-Identifier: Apache-2.0

//! Construction of filters and outputs from typed plugin descriptors.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::filter::{Filter, RegexFilter};
use crate::harvest::{Error, Result};
use crate::init::config::PluginConfig;
use crate::output::{OutputFactory, UdpOutputFactory};

/// Build the configured filter. An absent descriptor means accept-all.
pub fn build_filter(config: &PluginConfig) -> Result<Option<Arc<dyn Filter>>> {
    if config.is_empty() {
        return Ok(None);
    }

    match config.kind.as_str() {
        "regex" => {
            let filter = RegexFilter::from_settings(settings(config)?)?;
            Ok(Some(Arc::new(filter)))
        }
        other => Err(Error::Plugin(format!("unsupported filter type: {}", other))),
    }
}

/// Build the configured output factory
pub fn build_output_factory(config: &PluginConfig) -> Result<Arc<dyn OutputFactory>> {
    if config.is_empty() {
        return Err(Error::Plugin("no output configured".to_string()));
    }

    match config.kind.as_str() {
        "udp" => {
            let factory = UdpOutputFactory::from_settings(settings(config)?)?;
            Ok(Arc::new(factory))
        }
        other => Err(Error::Plugin(format!("unsupported output type: {}", other))),
    }
}

fn settings<T: DeserializeOwned>(config: &PluginConfig) -> Result<T> {
    serde_json::from_value(config.settings.clone()).map_err(|e| {
        Error::Plugin(format!("invalid {} settings: {}", config.kind, e))
    })
}

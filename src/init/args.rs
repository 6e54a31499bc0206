// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tailhaul")]
#[command(bin_name = "tailhaul")]
#[command(version, about, long_about = None)]
pub struct Arguments {
    /// Configuration file
    #[arg(short, long, env = "TAILHAUL_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Log format
    #[arg(value_enum, long, env = "TAILHAUL_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormatArg,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

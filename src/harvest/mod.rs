// SPDX-License-Identifier: Apache-2.0

//! Log file harvesting.
//!
//! Files matching a set of glob patterns are tailed line by line, optionally
//! filtered, and forwarded to an output. Read progress is tracked per file
//! identity (device and inode) and periodically persisted to an offset
//! registry so a restart resumes where the previous run stopped.
//!
//! Features:
//! - Identity based tracking that survives renames and detects truncation
//! - One blocking worker thread per file, coordinated by a single async task
//! - Atomic registry dumps with age based expiry

pub mod beater;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod file_id;
pub mod finder;
pub mod registry;
pub mod scanner;

pub use beater::{FileBeater, FileStatus};
pub use config::HarvestConfig;
pub use coordinator::{Harvester, PROGRESS_QUEUE_SIZE, Progress};
pub use error::{Error, Result};
pub use file_id::{FileId, ParseFileIdError};
pub use finder::FileFinder;
pub use registry::{FileOffset, Registry};
pub use scanner::{LineScanner, MAX_BUF_SIZE, START_BUF_SIZE, ScanError};

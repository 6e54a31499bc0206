// SPDX-License-Identifier: Apache-2.0

//! Harvest coordinator.
//!
//! Architecture:
//! - One dedicated OS thread per harvested file runs a blocking read/sleep loop
//!   (see [`FileBeater`]) and forwards accepted lines to its own output
//! - Workers report progress over a bounded queue; they never touch the
//!   registry or the active set
//! - The coordinator task is the single owner of the registry and the active
//!   set. It multiplexes progress, the periodic dump/discovery tick and
//!   cancellation on one `select!`, so none of those run concurrently
//!
//! Workers are not joined on shutdown. The registry holds the last offset each
//! worker reported, so a restart resumes from there (lines written after that
//! offset may be delivered twice).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tokio::select;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bounded_channel::{self, BoundedReceiver, BoundedSender};
use crate::filter::Filter;
use crate::output::{Output, OutputFactory};

use super::beater::FileBeater;
use super::config::HarvestConfig;
use super::error::{Error, Result};
use super::file_id::FileId;
use super::finder::FileFinder;
use super::registry::{FileOffset, Registry};
use super::scanner::ScanError;

/// Capacity of the worker progress queue
pub const PROGRESS_QUEUE_SIZE: usize = 32;

/// Message sent from a worker to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A line was consumed; the offset is the position after it
    Advanced(FileOffset),
    /// The worker exited and released its file
    Finished(FileId),
}

/// Shared worker context (immutable, cloned to each worker)
#[derive(Clone)]
struct WorkerContext {
    filter: Option<Arc<dyn Filter>>,
    progress_tx: BoundedSender<Progress>,
}

/// Owns the registry, the set of files being harvested and the worker
/// plumbing.
pub struct Harvester {
    config: HarvestConfig,
    finder: FileFinder,
    registry: Registry,
    /// Identities with a running worker; the dedup key for discovery
    active: HashSet<FileId>,
    output_factory: Arc<dyn OutputFactory>,
    worker_ctx: WorkerContext,
    progress_rx: BoundedReceiver<Progress>,
}

impl Harvester {
    /// Create a harvester. Nothing is read or started until [`Harvester::start`].
    pub fn new(
        config: HarvestConfig,
        output_factory: Arc<dyn OutputFactory>,
        filter: Option<Arc<dyn Filter>>,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let finder = FileFinder::new(config.include.clone())?;
        let registry = Registry::new(&config.registry_path, config.registry_ttl);
        let (progress_tx, progress_rx) = bounded_channel::bounded(PROGRESS_QUEUE_SIZE);

        Ok(Self {
            config,
            finder,
            registry,
            active: HashSet::new(),
            output_factory,
            worker_ctx: WorkerContext {
                filter,
                progress_tx,
            },
            progress_rx,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: &FileId) -> bool {
        self.active.contains(id)
    }

    /// Load the registry and start a worker for every matching file that
    /// still has unread data.
    ///
    /// A malformed registry is fatal; a file that cannot be started is logged
    /// and skipped.
    pub fn start(&mut self) -> Result<()> {
        self.registry.load()?;
        info!(
            path = ?self.registry.path(),
            entries = self.registry.len(),
            "Loaded offset registry"
        );

        for path in self.finder.find_files() {
            if let Err(e) = self.start_beater(&path) {
                warn!(path = ?path, error = %e, "Failed to start harvesting file");
            }
        }

        info!(
            patterns = ?self.finder.patterns(),
            active = self.active.len(),
            "Harvester started"
        );
        Ok(())
    }

    /// Run the event loop until `cancel` fires, then dump the registry a last
    /// time.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let period = self.config.dump_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;

                _ = ticker.tick() => {
                    self.maintain();
                }

                _ = cancel.cancelled() => {
                    info!("Harvester cancelled, persisting registry");
                    break;
                }

                Some(progress) = self.progress_rx.next() => {
                    self.handle_progress(progress);
                }
            }
        }

        while let Some(progress) = self.progress_rx.try_recv() {
            self.handle_progress(progress);
        }

        if let Err(e) = self.registry.dump() {
            error!(path = ?self.registry.path(), error = %e, "Failed to dump registry on shutdown");
            return Err(e);
        }

        info!(entries = self.registry.len(), "Harvester stopped");
        Ok(())
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::Advanced(offset) => self.registry.set(offset),
            // The last real offset stays in the registry, so a finished file
            // is recognised as fully consumed after a restart.
            Progress::Finished(id) => {
                self.active.remove(&id);
                debug!(file_id = %id, active = self.active.len(), "Worker finished");
            }
        }
    }

    /// Periodic work: persist the registry, then look for new files.
    fn maintain(&mut self) {
        if let Err(e) = self.registry.dump() {
            error!(path = ?self.registry.path(), error = %e, "Failed to dump registry");
        }

        if self.config.discover {
            let started = self.discover();
            if started > 0 {
                info!(started, active = self.active.len(), "Discovered new files");
            }
        }
    }

    /// Start workers for matching files whose identity is not already being
    /// harvested. Returns the number of workers started.
    pub fn discover(&mut self) -> usize {
        let mut started = 0;
        for path in self.finder.find_files() {
            match self.start_beater(&path) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!(path = ?path, error = %e, "Failed to start harvesting file"),
            }
        }
        started
    }

    /// Decide the resume offset for `path` and spawn its worker.
    ///
    /// Returns `Ok(false)` when the file is already being harvested, is not a
    /// regular file, or the registry says it was already read to its current
    /// end.
    fn start_beater(&mut self, path: &Path) -> Result<bool> {
        let (id, metadata) = FileId::stat(path)?;
        if self.active.contains(&id) {
            return Ok(false);
        }
        if !metadata.is_file() {
            debug!(path = ?path, "Skipping non-regular file");
            return Ok(false);
        }
        let size = metadata.len();

        // A prior offset beyond the current size falls through to 0; the
        // worker handles truncation that happens while it runs.
        let offset = match self.registry.get(&id) {
            Some(prior) if prior.offset == size => {
                debug!(path = ?path, file_id = %id, offset = size, "File already fully harvested");
                return Ok(false);
            }
            Some(prior) if prior.offset < size => prior.offset,
            _ => 0,
        };

        let beater = FileBeater::open(id, path, offset, self.config.harvest_interval)?;
        let output = self.output_factory.create()?;

        let ctx = self.worker_ctx.clone();
        self.active.insert(id);
        let spawned = thread::Builder::new()
            .name(format!("harvest-{}", id))
            .spawn(move || harvest(beater, output, ctx));
        if let Err(e) = spawned {
            self.active.remove(&id);
            return Err(e.into());
        }

        info!(path = ?path, file_id = %id, offset, "Started harvesting");
        Ok(true)
    }
}

/// Worker loop: read, filter, write, report. Runs on its own thread until the
/// file finishes or the output fails.
fn harvest(mut beater: FileBeater, mut output: Box<dyn Output>, ctx: WorkerContext) {
    let id = beater.id();

    loop {
        let line = match beater.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(path = ?beater.path(), file_id = %id, "Harvest finished");
                break;
            }
            Err(ScanError::Overflow(record)) => {
                error!(
                    path = ?beater.path(),
                    file_id = %id,
                    offset = beater.offset(),
                    len = record.len(),
                    "Line exceeds maximum size, stopping harvest"
                );
                break;
            }
            Err(e) => {
                error!(path = ?beater.path(), file_id = %id, error = %e, "Failed to read file");
                break;
            }
        };

        let accepted = ctx.filter.as_ref().is_none_or(|f| f.accept(&line));
        if accepted {
            // A failed write is never retried
            if let Err(e) = output.write(&line) {
                error!(path = ?beater.path(), file_id = %id, error = %e, "Failed to write line");
                break;
            }
        }

        let progress = Progress::Advanced(FileOffset::now(id, beater.offset()));
        if ctx.progress_tx.send_blocking(progress).is_err() {
            debug!(path = ?beater.path(), "Progress channel closed, stopping worker");
            break;
        }
    }

    if let Err(e) = output.close() {
        warn!(path = ?beater.path(), error = %e, "Failed to close output");
    }
    beater.close();

    let _ = ctx.progress_tx.send_blocking(Progress::Finished(id));
}

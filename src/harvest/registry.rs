// SPDX-License-Identifier: Apache-2.0

//! Persistent table of per-file read offsets.
//!
//! The backing file is plain text, one `file_id,offset,timestamp` record per
//! line. It is rewritten wholesale on every dump using write-to-temp-then-rename
//! so a reader never observes a half-written registry.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::error::{Error, Result};
use super::file_id::FileId;

/// Last confirmed read position of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOffset {
    pub id: FileId,
    /// Bytes consumed from the start of the file
    pub offset: u64,
    /// Unix timestamp (seconds) of the last update
    pub updated_at: i64,
}

impl FileOffset {
    /// Offset stamped with the current time
    pub fn now(id: FileId, offset: u64) -> Self {
        Self {
            id,
            offset,
            updated_at: unix_now(),
        }
    }
}

/// Current time as seconds since the Unix epoch
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// In-memory offset table backed by a single flat file.
///
/// Not synchronised: the coordinator is its only owner.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    ttl: Duration,
    offsets: HashMap<FileId, FileOffset>,
}

impl Registry {
    pub fn new(path: impl AsRef<Path>, ttl: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl,
            offsets: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &FileId) -> Option<&FileOffset> {
        self.offsets.get(id)
    }

    pub fn set(&mut self, entry: FileOffset) {
        self.offsets.insert(entry.id, entry);
    }

    pub fn remove(&mut self, id: &FileId) -> Option<FileOffset> {
        self.offsets.remove(id)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileOffset> {
        self.offsets.values()
    }

    /// Load entries from disk. A missing file is not an error.
    ///
    /// Entries at least `ttl` old are skipped. Any malformed record aborts the
    /// load.
    pub fn load(&mut self) -> Result<()> {
        self.load_at(unix_now())
    }

    fn load_at(&mut self, now: i64) -> Result<()> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No registry file found, starting fresh");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let ttl = self.ttl_secs();
        let mut loaded = 0usize;
        let mut expired = 0usize;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = parse_record(&line).map_err(|reason| Error::Registry {
                line: index + 1,
                reason,
            })?;
            if now.saturating_sub(entry.updated_at) >= ttl {
                expired += 1;
                continue;
            }
            self.offsets.insert(entry.id, entry);
            loaded += 1;
        }

        debug!(path = ?self.path, loaded, expired, "Loaded registry");
        Ok(())
    }

    /// Evict expired entries and atomically rewrite the backing file.
    pub fn dump(&mut self) -> Result<()> {
        self.dump_at(unix_now())
    }

    fn dump_at(&mut self, now: i64) -> Result<()> {
        let ttl = self.ttl_secs();
        self.offsets.retain(|_, v| now.saturating_sub(v.updated_at) <= ttl);

        atomic_write(&self.path, self.offsets.values())
    }

    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

fn parse_record(line: &str) -> std::result::Result<FileOffset, String> {
    let mut fields = line.split(',');
    let (Some(id), Some(offset), Some(updated_at)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("expected file_id,offset,timestamp, got {:?}", line));
    };

    let id = id.parse::<FileId>().map_err(|e| e.to_string())?;
    let offset = offset
        .parse::<u64>()
        .map_err(|e| format!("invalid offset {:?}: {}", offset, e))?;
    let updated_at = updated_at
        .parse::<i64>()
        .map_err(|e| format!("invalid timestamp {:?}: {}", updated_at, e))?;

    Ok(FileOffset {
        id,
        offset,
        updated_at,
    })
}

/// Write records to a temp sibling, then rename it over `path`
fn atomic_write<'a>(path: &Path, entries: impl Iterator<Item = &'a FileOffset>) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(format!(".tmp.{}.{}", std::process::id(), unique_id));
    let temp_path = PathBuf::from(temp_name);

    let result = write_records(&temp_path, entries).and_then(|_| {
        fs::rename(&temp_path, path)?;
        Ok(())
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_records<'a>(path: &Path, entries: impl Iterator<Item = &'a FileOffset>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(writer, "{},{},{}", entry.id, entry.offset, entry.updated_at)?;
    }
    writer.flush()?;
    Ok(())
}

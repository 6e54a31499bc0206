// SPDX-License-Identifier: Apache-2.0

//! Per-file tail worker.
//!
//! A [`FileBeater`] owns one open file and turns its growth into a stream of
//! trimmed, non-empty lines. It polls: when no data is available it sleeps for
//! the harvest interval, and every [`STAT_CHECK_EVERY`] empty reads it checks
//! whether the file was truncated, moved or deleted.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::file_id::FileId;
use super::scanner::{LineScanner, ScanError, trim_line_ending};

/// Consecutive empty reads between two file status checks.
pub const STAT_CHECK_EVERY: u32 = 100;

/// Outcome of a file status check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The path no longer resolves to the file being read (deleted or moved)
    Finished,
    /// Same file, but shorter than what has already been consumed
    Truncated,
    /// Nothing changed, keep polling
    Continue,
}

/// Tails a single file from a given offset.
pub struct FileBeater {
    id: FileId,
    path: PathBuf,
    /// Bytes consumed from the start of the file, line endings and blank
    /// lines included
    offset: u64,
    interval: Duration,
    scanner: LineScanner<File>,
}

impl FileBeater {
    /// Open `path` and position it at `offset`.
    pub fn open(
        id: FileId,
        path: impl AsRef<Path>,
        offset: u64,
        interval: Duration,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }

        Ok(Self {
            id,
            path,
            offset,
            interval,
            scanner: LineScanner::new(file),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Block until the next non-empty line is available.
    ///
    /// Returns `Ok(None)` once the file has been moved or deleted and the
    /// remaining buffered bytes were handed out.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, ScanError> {
        let mut empty_reads = 0u32;
        loop {
            match self.scanner.scan() {
                Ok(Some(mut line)) => {
                    empty_reads = 0;
                    self.offset += line.len() as u64;
                    let trimmed = trim_line_ending(&line).len();
                    if trimmed == 0 {
                        continue;
                    }
                    line.truncate(trimmed);
                    return Ok(Some(line));
                }
                Ok(None) => {}
                Err(ScanError::Stopped) => return Ok(None),
                Err(e) => return Err(e),
            }

            empty_reads += 1;
            if empty_reads >= STAT_CHECK_EVERY {
                empty_reads = 0;
                match self.status() {
                    FileStatus::Finished => {
                        info!(path = ?self.path, file_id = %self.id, "File moved or deleted, stopping scan");
                        self.scanner.stop();
                        continue;
                    }
                    FileStatus::Truncated => {
                        info!(path = ?self.path, file_id = %self.id, offset = self.offset, "File truncated, seeking to head");
                        self.scanner.get_mut().seek(SeekFrom::Start(0))?;
                        self.offset = 0;
                        self.scanner.reset();
                    }
                    FileStatus::Continue => {}
                }
            }

            thread::sleep(self.interval);
        }
    }

    /// Classify what happened to the file behind our path.
    pub fn status(&self) -> FileStatus {
        match FileId::stat(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => FileStatus::Finished,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to stat file");
                FileStatus::Continue
            }
            Ok((id, _)) if id != self.id => FileStatus::Finished,
            Ok((_, metadata)) if metadata.len() < self.offset => FileStatus::Truncated,
            Ok(_) => FileStatus::Continue,
        }
    }

    /// Release the file handle.
    pub fn close(self) {
        debug!(path = ?self.path, offset = self.offset, "Closing file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    const INTERVAL: Duration = Duration::from_millis(1);

    fn open(path: &Path, offset: u64) -> FileBeater {
        let id = FileId::from_path(path).unwrap();
        FileBeater::open(id, path, offset, INTERVAL).unwrap()
    }

    fn append(path: &Path, data: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_read_line_trims_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"first\r\n\n\r\nsecond\n").unwrap();

        let mut beater = open(&path, 0);

        assert_eq!(beater.read_line().unwrap(), Some(b"first".to_vec()));
        assert_eq!(beater.offset(), 7);
        assert_eq!(beater.read_line().unwrap(), Some(b"second".to_vec()));
        // blank lines are not delivered but their bytes are consumed
        assert_eq!(beater.offset(), 17);
    }

    #[test]
    fn test_read_line_resumes_at_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"skipped\nwanted\n").unwrap();

        let mut beater = open(&path, 8);

        assert_eq!(beater.read_line().unwrap(), Some(b"wanted".to_vec()));
        assert_eq!(beater.offset(), 15);
    }

    #[test]
    fn test_read_line_waits_for_appended_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"").unwrap();

        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            append(&writer_path, b"hel");
            thread::sleep(Duration::from_millis(20));
            append(&writer_path, b"lo\n");
        });

        let mut beater = open(&path, 0);
        assert_eq!(beater.read_line().unwrap(), Some(b"hello".to_vec()));
        writer.join().unwrap();
    }

    #[test]
    fn test_truncation_restarts_from_head() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let content: Vec<u8> = (0..50)
            .flat_map(|i| format!("line-{:04}\n", i).into_bytes())
            .collect();
        assert_eq!(content.len(), 500);
        fs::write(&path, &content).unwrap();

        let mut beater = open(&path, 500);
        // rewrite in place: same inode, shorter content
        fs::write(&path, b"truncated\n").unwrap();

        assert_eq!(beater.read_line().unwrap(), Some(b"truncated".to_vec()));
        assert_eq!(beater.offset(), 10);
    }

    #[cfg(unix)]
    #[test]
    fn test_deleted_file_drains_remainder_then_finishes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"a\nunterminated").unwrap();

        let mut beater = open(&path, 0);
        assert_eq!(beater.read_line().unwrap(), Some(b"a".to_vec()));

        fs::remove_file(&path).unwrap();

        assert_eq!(beater.read_line().unwrap(), Some(b"unterminated".to_vec()));
        assert_eq!(beater.read_line().unwrap(), None);
        assert_eq!(beater.offset(), 14);
    }

    #[cfg(unix)]
    #[test]
    fn test_moved_file_finishes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"a\n").unwrap();

        let mut beater = open(&path, 0);
        assert_eq!(beater.read_line().unwrap(), Some(b"a".to_vec()));

        fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        // a new file under the old name has a different identity
        fs::write(&path, b"someone else\n").unwrap();

        assert_eq!(beater.status(), FileStatus::Finished);
        assert_eq!(beater.read_line().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_status_classification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"0123456789\n").unwrap();

        let beater = open(&path, 11);
        assert_eq!(beater.status(), FileStatus::Continue);

        fs::write(&path, b"0123\n").unwrap();
        assert_eq!(beater.status(), FileStatus::Truncated);

        fs::remove_file(&path).unwrap();
        assert_eq!(beater.status(), FileStatus::Finished);
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_failure_keeps_polling() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        let path = logs.join("app.log");
        fs::write(&path, b"first\n").unwrap();

        let mut beater = open(&path, 0);
        assert_eq!(beater.read_line().unwrap().unwrap(), b"first");

        // a regular file where the directory was: the path now fails with
        // ENOTDIR rather than NotFound
        fs::rename(&logs, dir.path().join("logs.old")).unwrap();
        fs::write(&logs, b"").unwrap();
        assert_eq!(beater.status(), FileStatus::Continue);

        // the open handle still sees appended data
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("logs.old").join("app.log"))
            .unwrap();
        file.write_all(b"second\n").unwrap();
        assert_eq!(beater.read_line().unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.log");

        let result = FileBeater::open(FileId::new(1, 1), &path, 0, INTERVAL);
        assert_eq!(result.err().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
    }
}

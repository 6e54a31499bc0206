// SPDX-License-Identifier: Apache-2.0

//! Platform-independent file identity based on inode (Unix) or file index (Windows).
//!
//! The identity survives renames, which lets the harvester recognise a file it
//! is already tailing under a new name. It does not survive delete+recreate.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// A platform-independent unique identifier for a file.
///
/// On Unix systems, this is the device ID + inode number.
/// On Windows, this is the volume serial number + file index.
///
/// The textual form is `dev:ino`, which is also the key written to the
/// registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    /// Device ID (Unix) or volume serial number (Windows)
    dev: u64,
    /// Inode number (Unix) or file index (Windows)
    ino: u64,
}

impl FileId {
    /// Create a FileId from raw device and inode values.
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Create a FileId from an open file handle.
    #[cfg(unix)]
    pub fn from_file(file: &File) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = file.metadata()?;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Create a FileId from an open file handle.
    #[cfg(windows)]
    pub fn from_file(file: &File) -> io::Result<Self> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
        };

        let handle = file.as_raw_handle() as HANDLE;
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };

        let result = unsafe { GetFileInformationByHandle(handle, &mut info) };
        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        let file_index = ((info.nFileIndexHigh as u64) << 32) | (info.nFileIndexLow as u64);

        Ok(Self {
            dev: info.dwVolumeSerialNumber as u64,
            ino: file_index,
        })
    }

    /// Create a FileId from a path. Does not open the file on Unix.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::stat(path).map(|(id, _)| id)
    }

    /// Resolve the identity and metadata of `path` with a single stat.
    #[cfg(unix)]
    pub fn stat(path: impl AsRef<Path>) -> io::Result<(Self, Metadata)> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::metadata(path)?;
        let id = Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        };
        Ok((id, metadata))
    }

    /// Resolve the identity and metadata of `path`.
    ///
    /// The file index is only available through a handle on Windows.
    #[cfg(windows)]
    pub fn stat(path: impl AsRef<Path>) -> io::Result<(Self, Metadata)> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::other("not a regular file"));
        }
        let file = File::open(path)?;
        Ok((Self::from_file(&file)?, metadata))
    }

    /// Get the device ID (Unix) or volume serial number (Windows).
    pub fn dev(&self) -> u64 {
        self.dev
    }

    /// Get the inode number (Unix) or file index (Windows).
    pub fn ino(&self) -> u64 {
        self.ino
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFileIdError(String);

impl std::fmt::Display for ParseFileIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid file id {:?}, expected dev:ino", self.0)
    }
}

impl std::error::Error for ParseFileIdError {}

impl FromStr for FileId {
    type Err = ParseFileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFileIdError(s.to_string());
        let (dev, ino) = s.split_once(':').ok_or_else(err)?;
        Ok(Self {
            dev: dev.parse().map_err(|_| err())?,
            ino: ino.parse().map_err(|_| err())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_id_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let id = FileId::from_path(file.path()).unwrap();

        assert!(id.dev() > 0 || id.ino() > 0);
    }

    #[test]
    fn test_file_id_different_files() {
        let file1 = NamedTempFile::new().unwrap();
        let file2 = NamedTempFile::new().unwrap();

        let id1 = FileId::from_path(file1.path()).unwrap();
        let id2 = FileId::from_path(file2.path()).unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_file_id_stable_across_rename() {
        let dir = tempfile::tempdir().unwrap();
        let before = dir.path().join("app.log");
        let after = dir.path().join("app.log.1");
        std::fs::write(&before, "line\n").unwrap();

        let id1 = FileId::from_path(&before).unwrap();
        std::fs::rename(&before, &after).unwrap();
        let id2 = FileId::from_path(&after).unwrap();

        assert_eq!(id1, id2);
    }

    #[test]
    fn test_file_id_stable_across_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "a much longer first version\n").unwrap();

        let id1 = FileId::from_path(&path).unwrap();
        std::fs::write(&path, "short\n").unwrap();
        let id2 = FileId::from_path(&path).unwrap();

        assert_eq!(id1, id2);
    }

    #[test]
    fn test_stat_matches_open_handle() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "12345").unwrap();

        let (id, metadata) = FileId::stat(file.path()).unwrap();
        assert_eq!(id, FileId::from_file(file.as_file()).unwrap());
        assert_eq!(metadata.len(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_does_not_open_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("pipe.log");
        let created = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !created {
            eprintln!("Skipping test: mkfifo unavailable");
            return;
        }

        // opening a FIFO with no writer would block here
        let (_, metadata) = FileId::stat(&fifo).unwrap();
        assert!(!metadata.is_file());
    }

    #[test]
    fn test_file_id_display_and_parse() {
        let id = FileId::new(123, 456);
        assert_eq!(id.to_string(), "123:456");
        assert_eq!("123:456".parse::<FileId>().unwrap(), id);
    }

    #[test]
    fn test_file_id_parse_rejects_garbage() {
        assert!("123".parse::<FileId>().is_err());
        assert!("a:1".parse::<FileId>().is_err());
        assert!("1:".parse::<FileId>().is_err());
        assert!("1:2:3".parse::<FileId>().is_err());
    }
}

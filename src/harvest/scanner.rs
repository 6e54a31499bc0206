// SPDX-License-Identifier: Apache-2.0

//! Incremental line scanner for files that keep growing.
//!
//! Unlike `BufRead::lines`, a scan that finds no complete line and no new
//! bytes returns `Ok(None)` instead of treating the condition as the end of
//! input. The caller decides when to retry, and calls [`LineScanner::stop`]
//! once it knows no more data will arrive.

use std::io::{self, Read};

use thiserror::Error;

/// Size of the initial buffer allocation.
pub const START_BUF_SIZE: usize = 4096;

/// Hard cap for the buffer. A line longer than this is delivered truncated.
pub const MAX_BUF_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ScanError {
    /// No newline was found within [`MAX_BUF_SIZE`] bytes. Carries the
    /// truncated record.
    #[error("line exceeds maximum buffer size of {MAX_BUF_SIZE} bytes")]
    Overflow(Vec<u8>),

    #[error("scanner stopped")]
    Stopped,

    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// Error remembered until the buffered remainder has been handed out.
#[derive(Debug)]
enum Sticky {
    Stopped,
    Io(io::Error),
}

/// Extracts newline terminated records from a reader that may have no data
/// available yet.
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: R,
    buf: Vec<u8>,
    /// First unconsumed byte in `buf`
    start: usize,
    /// End of valid data in `buf`
    end: usize,
    sticky: Option<Sticky>,
}

impl<R: Read> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; START_BUF_SIZE],
            start: 0,
            end: 0,
            sticky: None,
        }
    }

    /// Mark the stream as logically closed.
    ///
    /// Subsequent scans never read again: they return whatever is still
    /// buffered (split on newlines, the final partial line as its own record)
    /// and then [`ScanError::Stopped`]. A read error recorded earlier takes
    /// precedence over the stop.
    pub fn stop(&mut self) {
        if self.sticky.is_none() {
            self.sticky = Some(Sticky::Stopped);
        }
    }

    /// Discard all buffered state, as if the scanner had just been created
    /// over the same reader.
    pub fn reset(&mut self) {
        self.buf = vec![0; START_BUF_SIZE];
        self.start = 0;
        self.end = 0;
        self.sticky = None;
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Number of bytes read from the reader but not yet returned.
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Scan for the next line. The returned record keeps its line ending.
    ///
    /// `Ok(None)` means no complete line is available right now; call again
    /// later. After an error has been surfaced every further call returns
    /// [`ScanError::Stopped`].
    pub fn scan(&mut self) -> Result<Option<Vec<u8>>, ScanError> {
        loop {
            if self.end > self.start {
                let pending = &self.buf[self.start..self.end];
                if let Some(i) = pending.iter().position(|&b| b == b'\n') {
                    let line = pending[..=i].to_vec();
                    self.start += i + 1;
                    return Ok(Some(line));
                }
            }

            if self.sticky.is_some() {
                if self.end > self.start {
                    let rest = self.buf[self.start..self.end].to_vec();
                    self.start = self.end;
                    return Ok(Some(rest));
                }
                return Err(match self.sticky.replace(Sticky::Stopped) {
                    Some(Sticky::Io(e)) => ScanError::Io(e),
                    _ => ScanError::Stopped,
                });
            }

            if self.start > 0 && (self.end == self.buf.len() || self.start > self.buf.len() / 2) {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            } else if self.end == self.buf.len() {
                if self.buf.len() >= MAX_BUF_SIZE {
                    let record = self.buf[..self.end].to_vec();
                    self.start = 0;
                    self.end = 0;
                    return Err(ScanError::Overflow(record));
                }
                let new_size = (self.buf.len() * 2).min(MAX_BUF_SIZE);
                self.buf.resize(new_size, 0);
            }

            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => return Ok(None),
                Ok(n) => self.end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => self.sticky = Some(Sticky::Io(e)),
            }
        }
    }
}

/// Drop one trailing `\n`, then one trailing `\r`.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let mut n = line.len();
    if n > 0 && line[n - 1] == b'\n' {
        n -= 1;
    }
    if n > 0 && line[n - 1] == b'\r' {
        n -= 1;
    }
    &line[..n]
}

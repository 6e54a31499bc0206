// SPDX-License-Identifier: Apache-2.0

//! Line filters.
//!
//! A filter decides whether a trimmed line is forwarded to the output. When
//! no filter is configured every line is accepted.

mod regex;

pub use self::regex::{RegexFilter, RegexFilterSettings};

/// Predicate over the raw bytes of one line
pub trait Filter: Send + Sync {
    fn accept(&self, line: &[u8]) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn accept(&self, line: &[u8]) -> bool {
        self(line)
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Output sinks.
//!
//! Every harvest worker asks the [`OutputFactory`] for its own [`Output`], so
//! no sink instance is ever shared between workers. A sink that shares an
//! underlying resource internally is responsible for its own synchronisation.

mod udp;

pub use udp::{MAX_UDP_PAYLOAD, UdpOutput, UdpOutputFactory, UdpOutputSettings};

use crate::harvest::error::Result;

/// Write-and-close sink receiving one accepted line per write, without a
/// trailing delimiter.
pub trait Output: Send {
    /// A failed write is final: the caller must not retry and should stop
    /// using the sink.
    fn write(&mut self, line: &[u8]) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Produces an independent [`Output`] per worker
pub trait OutputFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Output>>;
}

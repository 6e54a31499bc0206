// SPDX-License-Identifier: Apache-2.0

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use serde::Deserialize;
use tracing::debug;

use super::{Output, OutputFactory};
use crate::harvest::error::{Error, Result};

/// Largest UDP payload over IPv4. Longer lines are truncated before sending.
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Settings payload of a `udp` output descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct UdpOutputSettings {
    pub address: String,
}

/// Creates one UDP sender per worker, all targeting the same address.
///
/// The address is resolved once, when the factory is built.
#[derive(Debug, Clone)]
pub struct UdpOutputFactory {
    target: SocketAddr,
}

impl UdpOutputFactory {
    pub fn new(address: &str) -> Result<Self> {
        let target = address
            .to_socket_addrs()
            .map_err(|e| Error::Output(format!("failed to resolve {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::Output(format!("{} resolved to no addresses", address)))?;
        Ok(Self { target })
    }

    pub fn from_settings(settings: UdpOutputSettings) -> Result<Self> {
        Self::new(&settings.address)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl OutputFactory for UdpOutputFactory {
    fn create(&self) -> Result<Box<dyn Output>> {
        let bind_addr: SocketAddr = if self.target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        debug!(local = ?socket.local_addr().ok(), target = %self.target, "Created UDP output");
        Ok(Box::new(UdpOutput {
            socket,
            target: self.target,
        }))
    }
}

/// Sends every line as one datagram
#[derive(Debug)]
pub struct UdpOutput {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Output for UdpOutput {
    fn write(&mut self, line: &[u8]) -> Result<()> {
        self.socket.send_to(clamp_payload(line), self.target)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn clamp_payload(line: &[u8]) -> &[u8] {
    &line[..line.len().min(MAX_UDP_PAYLOAD)]
}

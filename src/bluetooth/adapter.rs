// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Endpoint adapter abstraction.
//!
//! The connection manager never talks to a Bluetooth stack directly. It goes
//! through [`EndpointAdapter`], which hands out listening and outbound
//! sockets. A socket is closed by dropping it.

use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::error::Result;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Opaque transport address of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Remote endpoint of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub address: PeerAddress,
    pub name: String,
}

impl Peer {
    pub fn new(address: PeerAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }

    /// Peer known only by address; the address doubles as its name.
    pub fn from_address(address: PeerAddress) -> Self {
        let name = address.to_string();
        Self { address, name }
    }
}

/// Service record the listening socket is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub uuid: Uuid,
    /// RFCOMM channel.
    pub channel: u8,
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self {
            name: "BTTerminal".to_string(),
            uuid: SPP_UUID,
            channel: 1,
        }
    }
}

/// Byte stream of a connected socket.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> LinkStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedStream = Box<dyn LinkStream>;

/// An inbound connection handed out by a [`ListenSocket`].
pub struct Accepted {
    pub stream: BoxedStream,
    pub peer: Peer,
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accepted").field("peer", &self.peer).finish()
    }
}

/// A bound, listening socket.
#[async_trait]
pub trait ListenSocket: Send + Sync {
    /// Wait for the next inbound connection.
    async fn accept_one(&self) -> io::Result<Accepted>;
}

/// An unconnected outbound socket targeting one peer.
#[async_trait]
pub trait OutboundSocket: Send {
    /// Perform the connect. Consumes the socket; on failure it is closed.
    async fn connect(self: Box<Self>) -> io::Result<BoxedStream>;
}

/// Local Bluetooth adapter capabilities consumed by the manager.
#[async_trait]
pub trait EndpointAdapter: Send + Sync + 'static {
    /// Whether a local adapter exists at all.
    fn is_available(&self) -> bool;

    /// Whether the adapter is powered.
    async fn is_enabled(&self) -> bool;

    /// Ask for the adapter to be powered on.
    async fn request_enable(&self) -> Result<()>;

    /// Power the adapter off.
    async fn disable(&self) -> Result<()>;

    /// Stop any passive discovery. Some stacks fail outbound connects while
    /// discovery is running.
    async fn cancel_discovery(&self);

    /// Create an outbound socket for `peer`.
    fn create_outbound_socket(
        &self,
        peer: &PeerAddress,
        service: &ServiceRecord,
    ) -> Result<Box<dyn OutboundSocket>>;

    /// Create a listening socket published under `service`.
    async fn create_listening_socket(
        &self,
        service: &ServiceRecord,
    ) -> Result<Box<dyn ListenSocket>>;
}

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

//! BlueZ implementation of the endpoint adapter over RFCOMM sockets.

use async_trait::async_trait;
use bluer::rfcomm::{Listener, Socket, SocketAddr};
use bluer::{Adapter, Address, Session};
use std::io;
use tracing::{debug, info, warn};

use super::adapter::{
    Accepted, BoxedStream, EndpointAdapter, ListenSocket, OutboundSocket, Peer, PeerAddress,
    ServiceRecord,
};
use crate::error::{LinkError, Result};

/// Endpoint adapter backed by the default BlueZ adapter.
pub struct BluezAdapter {
    adapter: Option<Adapter>,
    // Keeps the D-Bus connection alive for the adapter proxy.
    _session: Option<Session>,
}

impl BluezAdapter {
    /// Connect to BlueZ and pick the default adapter.
    ///
    /// A missing daemon or adapter is not an error here; it shows up as
    /// `is_available() == false`.
    pub async fn new() -> Self {
        info!("Initializing Bluetooth adapter...");

        let session = match Session::new().await {
            Ok(session) => session,
            Err(e) => {
                warn!("BlueZ session unavailable: {}", e);
                return Self::unavailable();
            }
        };
        info!("BlueZ session created");

        match session.default_adapter().await {
            Ok(adapter) => {
                info!("Using Bluetooth adapter: {}", adapter.name());
                Self {
                    adapter: Some(adapter),
                    _session: Some(session),
                }
            }
            Err(e) => {
                warn!("No Bluetooth adapter: {}", e);
                Self::unavailable()
            }
        }
    }

    fn unavailable() -> Self {
        Self {
            adapter: None,
            _session: None,
        }
    }

    fn adapter(&self) -> Result<&Adapter> {
        self.adapter.as_ref().ok_or(LinkError::Unavailable)
    }

    /// Set the name the adapter is visible under.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.adapter()?
            .set_alias(name.to_string())
            .await
            .map_err(bluer_io)?;
        info!("Bluetooth name set to: {}", name);
        Ok(())
    }
}

fn bluer_io(e: bluer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn parse_address(peer: &PeerAddress) -> Result<Address> {
    peer.as_str()
        .parse()
        .map_err(|_| LinkError::InvalidAddress(peer.to_string()))
}

#[async_trait]
impl EndpointAdapter for BluezAdapter {
    fn is_available(&self) -> bool {
        self.adapter.is_some()
    }

    async fn is_enabled(&self) -> bool {
        match &self.adapter {
            Some(adapter) => adapter.is_powered().await.unwrap_or(false),
            None => false,
        }
    }

    async fn request_enable(&self) -> Result<()> {
        info!("Powering on Bluetooth adapter...");
        self.adapter()?.set_powered(true).await.map_err(bluer_io)?;
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        info!("Powering off Bluetooth adapter...");
        self.adapter()?.set_powered(false).await.map_err(bluer_io)?;
        Ok(())
    }

    async fn cancel_discovery(&self) {
        // BlueZ ends discovery when the owning discovery stream is dropped and
        // this process never holds one.
        debug!("No discovery session to cancel");
    }

    fn create_outbound_socket(
        &self,
        peer: &PeerAddress,
        service: &ServiceRecord,
    ) -> Result<Box<dyn OutboundSocket>> {
        self.adapter()?;
        let address = parse_address(peer)?;
        let socket = Socket::new().map_err(LinkError::Socket)?;
        Ok(Box::new(BluezOutbound {
            socket,
            target: SocketAddr::new(address, service.channel),
        }))
    }

    async fn create_listening_socket(
        &self,
        service: &ServiceRecord,
    ) -> Result<Box<dyn ListenSocket>> {
        let adapter = self.adapter()?.clone();
        let local_addr = SocketAddr::new(Address::any(), service.channel);
        let listener = Listener::bind(local_addr).await.map_err(LinkError::Listen)?;
        info!(
            "RFCOMM server listening on channel {} (UUID: {})",
            service.channel, service.uuid
        );
        Ok(Box::new(BluezListener { listener, adapter }))
    }
}

struct BluezOutbound {
    socket: Socket,
    target: SocketAddr,
}

#[async_trait]
impl OutboundSocket for BluezOutbound {
    async fn connect(self: Box<Self>) -> io::Result<BoxedStream> {
        let BluezOutbound { socket, target } = *self;
        debug!("Connecting to {:?}", target);
        let stream = socket.connect(target).await?;
        Ok(Box::new(stream))
    }
}

struct BluezListener {
    listener: Listener,
    adapter: Adapter,
}

#[async_trait]
impl ListenSocket for BluezListener {
    async fn accept_one(&self) -> io::Result<Accepted> {
        let (stream, remote_addr) = self.listener.accept().await?;
        info!("Connection from: {:?}", remote_addr);

        let name = match self.adapter.device(remote_addr.addr) {
            Ok(device) => device
                .alias()
                .await
                .unwrap_or_else(|_| remote_addr.addr.to_string()),
            Err(_) => remote_addr.addr.to_string(),
        };

        Ok(Accepted {
            stream: Box::new(stream),
            peer: Peer::new(PeerAddress::new(remote_addr.addr.to_string()), name),
        })
    }
}

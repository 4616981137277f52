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

//! Connection state and the shared status snapshot.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::bluetooth::Peer;

/// Lifecycle state of the single serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Idle: neither listening nor connecting.
    #[default]
    None,
    /// Waiting for an inbound connection.
    Listening,
    /// Dialing a peer.
    Connecting,
    /// A session is live.
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "None",
            ConnectionState::Listening => "Listening",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }

    /// Human readable status line, as shown next to the terminal title.
    pub fn title(&self) -> &'static str {
        match self {
            ConnectionState::None => "not connected",
            ConnectionState::Listening => "listening",
            ConnectionState::Connecting => "connecting...",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the link.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Peer of the live session, only set while `Connected`.
    pub peer: Option<Peer>,
}

/// Status shared between the controller task and its handles.
///
/// Only the controller writes; everyone else reads.
#[derive(Debug, Default)]
pub struct SharedStatus {
    inner: RwLock<LinkStatus>,
}

impl SharedStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get_state(&self) -> ConnectionState {
        self.inner.read().state
    }

    pub fn get_peer(&self) -> Option<Peer> {
        self.inner.read().peer.clone()
    }

    pub fn snapshot(&self) -> LinkStatus {
        self.inner.read().clone()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) -> ConnectionState {
        let mut status = self.inner.write();
        let previous = status.state;
        status.state = state;
        if state != ConnectionState::Connected {
            status.peer = None;
        }
        previous
    }

    pub(crate) fn set_peer(&self, peer: Peer) {
        self.inner.write().peer = Some(peer);
    }
}

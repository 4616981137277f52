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

//! Events published by the connection manager.

use tokio::sync::mpsc;
use tracing::debug;

use crate::state::ConnectionState;

/// Notice emitted after an explicit `disconnect()`.
pub const NOTICE_DISCONNECTED: &str = "disconnected";
/// Notice emitted when an outbound connection attempt fails.
pub const NOTICE_UNABLE_TO_CONNECT: &str = "unable to connect";
/// Notice emitted when a live session fails under us.
pub const NOTICE_CONNECTION_LOST: &str = "connection lost";

/// Events emitted to the registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The manager moved to a new state.
    StateChanged(ConnectionState),
    /// A session was established with the named peer.
    PeerIdentified(String),
    /// Bytes read from the session.
    DataReceived(Vec<u8>),
    /// Bytes written to the session.
    DataSent(Vec<u8>),
    /// Advisory text for the user.
    Notice(String),
}

impl LinkEvent {
    pub fn notice(text: impl Into<String>) -> Self {
        LinkEvent::Notice(text.into())
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Sending side of the subscriber queue.
///
/// The queue is unbounded so an emitting role never waits on the subscriber.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl EventSender {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. A subscriber that went away is not an error.
    pub fn emit(&self, event: LinkEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Dropping event, subscriber gone: {:?}", e.0);
        }
    }
}

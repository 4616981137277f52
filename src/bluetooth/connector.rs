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

//! Outbound connection role: one dial attempt to one peer.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::adapter::{EndpointAdapter, OutboundSocket, Peer};
use super::role::{cancel_pair, CancelHandle, CancelSignal, ReportSender, RoleId, RoleReport};

/// Handle to an in-flight dial.
#[derive(Debug)]
pub struct Connector {
    id: RoleId,
    peer: Peer,
    cancel: CancelHandle,
}

impl Connector {
    /// Start dialing `peer` over an already created outbound socket.
    pub(crate) fn start(
        id: RoleId,
        peer: Peer,
        adapter: Arc<dyn EndpointAdapter>,
        socket: Box<dyn OutboundSocket>,
        reports: ReportSender,
    ) -> Self {
        let (cancel, signal) = cancel_pair();
        tokio::spawn(Self::run(id, peer.clone(), adapter, socket, signal, reports));
        Self { id, peer, cancel }
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    /// The peer this connector dials.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Close the socket, aborting a pending connect.
    pub fn cancel(&self) {
        debug!("Connector {} cancel()", self.id);
        self.cancel.cancel();
    }

    async fn run(
        id: RoleId,
        peer: Peer,
        adapter: Arc<dyn EndpointAdapter>,
        socket: Box<dyn OutboundSocket>,
        mut signal: CancelSignal,
        reports: ReportSender,
    ) {
        debug!("BEGIN connector {} -> {}", id, peer.address);

        adapter.cancel_discovery().await;

        // A cancel that is already signalled wins over a connect that
        // completes in the same poll.
        let result = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                debug!("Connector {} cancelled before connect completed", id);
                return;
            }
            result = socket.connect() => result,
        };

        match result {
            Ok(stream) => {
                info!("Connected to: {} ({})", peer.name, peer.address);
                let _ = reports.send(RoleReport::Dialed { id, stream });
            }
            Err(error) => {
                warn!("Connector {} connect() failed: {}", id, error);
                if !signal.is_cancelled() {
                    let _ = reports.send(RoleReport::DialFailed { id, error });
                }
            }
        }

        debug!("END connector {}", id);
    }
}

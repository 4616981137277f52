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

//! Inbound connection role: owns the listening socket and its accept loop.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::adapter::{EndpointAdapter, ListenSocket, ServiceRecord};
use super::role::{cancel_pair, CancelHandle, CancelSignal, ReportSender, RoleId, RoleReport};
use crate::error::Result;

/// Handle to a running accept loop.
#[derive(Debug)]
pub struct Acceptor {
    id: RoleId,
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

impl Acceptor {
    /// Create the listening socket and start accepting.
    ///
    /// Fails if the listening socket cannot be created; nothing is spawned
    /// in that case.
    pub(crate) async fn bind(
        id: RoleId,
        adapter: &dyn EndpointAdapter,
        service: &ServiceRecord,
        reports: ReportSender,
    ) -> Result<Self> {
        let listener = adapter.create_listening_socket(service).await?;
        info!(
            "Listening as '{}' on channel {} (UUID: {})",
            service.name, service.channel, service.uuid
        );

        let (cancel, signal) = cancel_pair();
        let task = tokio::spawn(Self::accept_loop(id, listener, signal, reports));

        Ok(Self { id, cancel, task })
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Ask the loop to stop. The listening socket is released once the
    /// loop task observes the request.
    pub fn cancel(&self) {
        debug!("Acceptor {} cancel()", self.id);
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to exit, so the listening socket is
    /// closed and its channel free when this returns.
    pub async fn close(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!("Acceptor {} task ended abnormally: {}", self.id, e);
        }
        debug!("Acceptor {} closed", self.id);
    }

    async fn accept_loop(
        id: RoleId,
        listener: Box<dyn ListenSocket>,
        mut signal: CancelSignal,
        reports: ReportSender,
    ) {
        debug!("BEGIN accept loop {}", id);

        loop {
            let result = tokio::select! {
                _ = signal.cancelled() => break,
                result = listener.accept_one() => result,
            };

            match result {
                Ok(accepted) => {
                    info!("Inbound connection from: {}", accepted.peer.address);
                    if reports.send(RoleReport::Accepted { id, accepted }).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    debug!("Acceptor {} accept() failed: {}", id, error);
                    if !signal.is_cancelled() {
                        let _ = reports.send(RoleReport::AcceptStopped { id, error });
                    }
                    break;
                }
            }
        }

        // Dropping the listener here closes the listening socket.
        drop(listener);
        debug!("END accept loop {}", id);
    }
}

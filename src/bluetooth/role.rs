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

//! Plumbing shared by the acceptor, connector and session roles.

use std::fmt;
use std::io;
use tokio::sync::{mpsc, watch};

use super::adapter::{Accepted, BoxedStream};

/// Generation id of a role. Every role the manager creates gets a fresh one,
/// so a report from a role that has since been replaced can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId(u64);

impl RoleId {
    pub(crate) fn first() -> Self {
        Self(1)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion reports sent by role workers to the controller.
pub(crate) enum RoleReport {
    Accepted { id: RoleId, accepted: Accepted },
    AcceptStopped { id: RoleId, error: io::Error },
    Dialed { id: RoleId, stream: BoxedStream },
    DialFailed { id: RoleId, error: io::Error },
    SessionLost { id: RoleId, error: io::Error },
}

pub(crate) type ReportSender = mpsc::UnboundedSender<RoleReport>;

/// Cancel side of a role. Dropping it cancels too.
#[derive(Debug)]
pub(crate) struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Worker side of a role's cancellation flag.
#[derive(Debug, Clone)]
pub(crate) struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub(crate) fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled or once the handle is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

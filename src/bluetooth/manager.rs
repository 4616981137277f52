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

//! Connection manager.
//!
//! [`LinkManager`] is the only thing the outside world talks to. It owns the
//! connection state and at most one live [`Session`], and it creates and
//! cancels the [`Acceptor`] and [`Connector`] roles as side effects of its
//! operations.
//!
//! All state lives in a single controller task. Public operations and role
//! completions are both messages to that task, so they are applied one at a
//! time and a role can never observe or mutate manager state directly. Each
//! role carries a [`RoleId`]; a completion from a role that has since been
//! replaced is recognised as stale and cannot change the state.
//!
//! ```text
//! None --listen(true)--> Listening --accept--> Connected
//! Listening --connect(peer)--> Connecting --dial ok--> Connected
//! Connecting --dial fails--> None --listen re-applied--> Listening | None
//! Connected --read fails--> None --listen re-applied--> Listening | None
//! Connected --disconnect()--> None --listen re-applied--> Listening | None
//! any --stop()--> None
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::acceptor::Acceptor;
use super::adapter::{BoxedStream, EndpointAdapter, Peer, ServiceRecord};
use super::connector::Connector;
use super::role::{ReportSender, RoleId, RoleReport};
use super::session::{Session, SessionWriter, DEFAULT_READ_BUFFER};
use crate::error::{LinkError, Result};
use crate::events::{
    EventReceiver, EventSender, LinkEvent, NOTICE_CONNECTION_LOST, NOTICE_DISCONNECTED,
    NOTICE_UNABLE_TO_CONNECT,
};
use crate::state::{ConnectionState, LinkStatus, SharedStatus};

/// Settings the manager needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Service the listening socket is published under.
    pub service: ServiceRecord,
    /// Size of each session read.
    pub read_buffer_size: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            service: ServiceRecord::default(),
            read_buffer_size: DEFAULT_READ_BUFFER,
        }
    }
}

enum Command {
    Listen {
        enable: bool,
        reply: oneshot::Sender<()>,
    },
    Connect {
        peer: Peer,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Writer {
        reply: oneshot::Sender<Option<SessionWriter>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the connection manager.
///
/// Cheap to clone. Once every handle is dropped the manager stops.
#[derive(Clone)]
pub struct LinkManager {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<SharedStatus>,
    adapter: Arc<dyn EndpointAdapter>,
}

impl LinkManager {
    /// Start a manager on the current tokio runtime.
    ///
    /// Returns the handle and the subscriber end of the event queue.
    pub fn spawn(adapter: Arc<dyn EndpointAdapter>, settings: LinkSettings) -> (Self, EventReceiver) {
        let (events, event_rx) = EventSender::channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let status = SharedStatus::new();

        let controller = Controller::new(
            adapter.clone(),
            settings,
            status.clone(),
            events,
            report_tx,
        );
        tokio::spawn(controller.run(command_rx, report_rx));

        let manager = Self {
            commands: command_tx,
            status,
            adapter,
        };
        (manager, event_rx)
    }

    /// Enable or disable listening for inbound connections.
    ///
    /// The flag is sticky: failures and disconnects return to it.
    pub async fn listen(&self, enable: bool) -> Result<()> {
        self.request(|reply| Command::Listen { enable, reply }).await
    }

    /// Dial `peer`. Any live session is dropped first.
    pub async fn connect(&self, peer: Peer) -> Result<()> {
        self.request(|reply| Command::Connect { peer, reply }).await
    }

    /// Close the live session, if any, and return to the listen setting.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Send `data` over the live session.
    ///
    /// Silently ignored unless connected.
    pub async fn write(&self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.request(|reply| Command::Writer { reply }).await {
            Ok(Some(writer)) => writer.write(data).await,
            Ok(None) => debug!("write() ignored, not connected"),
            Err(_) => debug!("write() ignored, manager stopped"),
        }
    }

    /// Tear everything down. Idempotent.
    pub async fn stop(&self) {
        if self.request(|reply| Command::Stop { reply }).await.is_err() {
            debug!("stop() on a stopped manager");
        }
    }

    pub fn get_state(&self) -> ConnectionState {
        self.status.get_state()
    }

    /// Peer of the live session.
    pub fn get_peer(&self) -> Option<Peer> {
        self.status.get_peer()
    }

    pub fn status(&self) -> LinkStatus {
        self.status.snapshot()
    }

    /// Whether the manager still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn is_available(&self) -> bool {
        self.adapter.is_available()
    }

    pub async fn is_enabled(&self) -> bool {
        self.adapter.is_available() && self.adapter.is_enabled().await
    }

    /// Power the adapter on or off. Only acts when the power state differs.
    pub async fn set_enabled(&self, enable: bool) -> Result<()> {
        if !self.is_running() {
            return Err(LinkError::Stopped);
        }
        if !self.adapter.is_available() {
            return Err(LinkError::Unavailable);
        }

        let enabled = self.adapter.is_enabled().await;
        if enable && !enabled {
            info!("Requesting Bluetooth enable");
            self.adapter.request_enable().await
        } else if !enable && enabled {
            info!("Disabling Bluetooth");
            self.adapter.disable().await
        } else {
            Ok(())
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| LinkError::Stopped)?;
        response.await.map_err(|_| LinkError::Stopped)
    }
}

/// Owner of all manager state. Runs as a single task.
struct Controller {
    adapter: Arc<dyn EndpointAdapter>,
    settings: LinkSettings,
    state: ConnectionState,
    listen_requested: bool,
    acceptor: Option<Acceptor>,
    connector: Option<Connector>,
    session: Option<Session>,
    /// Sessions dropped with `cancel()` whose loss report is still due.
    discarded: HashSet<RoleId>,
    next_id: RoleId,
    status: Arc<SharedStatus>,
    events: EventSender,
    reports: ReportSender,
}

impl Controller {
    fn new(
        adapter: Arc<dyn EndpointAdapter>,
        settings: LinkSettings,
        status: Arc<SharedStatus>,
        events: EventSender,
        reports: ReportSender,
    ) -> Self {
        Self {
            adapter,
            settings,
            state: ConnectionState::None,
            listen_requested: false,
            acceptor: None,
            connector: None,
            session: None,
            discarded: HashSet::new(),
            next_id: RoleId::first(),
            status,
            events,
            reports,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<RoleReport>,
    ) {
        info!("Connection manager started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All manager handles dropped");
                        self.stop().await;
                        break;
                    }
                },
                Some(report) = reports.recv() => self.handle_report(report).await,
            }
        }

        info!("Connection manager stopped");
    }

    /// Returns false once the manager should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Listen { enable, reply } => {
                self.listen(enable).await;
                let _ = reply.send(());
            }
            Command::Connect { peer, reply } => {
                self.connect(peer).await;
                let _ = reply.send(());
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::Writer { reply } => {
                let _ = reply.send(self.writer());
            }
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn handle_report(&mut self, report: RoleReport) {
        match report {
            RoleReport::Accepted { id, accepted } => {
                let live = self.acceptor.as_ref().map(Acceptor::id) == Some(id);
                match self.state {
                    ConnectionState::Listening | ConnectionState::Connecting if live => {
                        self.promote(accepted.stream, accepted.peer).await;
                    }
                    state => {
                        // Not ready or already connected.
                        debug!(
                            "Rejecting inbound connection from {} (acceptor {}, state {})",
                            accepted.peer.address, id, state
                        );
                    }
                }
            }
            RoleReport::AcceptStopped { id, error } => {
                if self.acceptor.as_ref().map(Acceptor::id) != Some(id) {
                    debug!("Ignoring stop of stale acceptor {}", id);
                    return;
                }
                warn!("Accept loop ended: {}", error);
                self.close_acceptor().await;
                self.notice(format!("listening stopped: {}", error));
                if self.state == ConnectionState::Listening {
                    self.set_state(ConnectionState::None);
                }
            }
            RoleReport::Dialed { id, stream } => {
                if self.connector.as_ref().map(Connector::id) != Some(id) {
                    debug!("Dropping connection from stale connector {}", id);
                    return;
                }
                if let Some(connector) = self.connector.take() {
                    self.promote(stream, connector.peer().clone()).await;
                }
            }
            RoleReport::DialFailed { id, error } => {
                if self.connector.as_ref().map(Connector::id) != Some(id) {
                    debug!("Ignoring failure of stale connector {}: {}", id, error);
                    return;
                }
                self.connector = None;
                self.connection_failed().await;
            }
            RoleReport::SessionLost { id, error } => {
                if self.session.as_ref().map(Session::id) != Some(id) {
                    // A session discarded by cancel() still reports its loss;
                    // one closed on purpose never does.
                    if self.discarded.remove(&id) {
                        debug!("Session {} lost after being replaced: {}", id, error);
                        self.notice(NOTICE_CONNECTION_LOST);
                    } else {
                        debug!("Ignoring loss of closed session {}: {}", id, error);
                    }
                    return;
                }
                warn!("Connection lost: {}", error);
                if let Some(session) = self.session.take() {
                    session.cancel();
                }
                self.connection_lost().await;
            }
        }
    }

    async fn listen(&mut self, enable: bool) {
        debug!("listen({})", enable);

        self.set_state(ConnectionState::None);
        self.listen_requested = enable;

        if !enable {
            self.close_acceptor().await;
            return;
        }

        self.cancel_connector();
        self.cancel_session();

        if self.acceptor.is_none() {
            let id = self.next_role_id();
            let bound = Acceptor::bind(
                id,
                self.adapter.as_ref(),
                &self.settings.service,
                self.reports.clone(),
            )
            .await;

            match bound {
                Ok(acceptor) => self.acceptor = Some(acceptor),
                Err(e) => {
                    warn!("Listening socket creation failed: {}", e);
                    let text = if matches!(e, LinkError::Listen(_)) {
                        e.to_string()
                    } else {
                        format!("unable to listen: {}", e)
                    };
                    self.notice(text);
                    return;
                }
            }
        }

        self.set_state(ConnectionState::Listening);
    }

    async fn connect(&mut self, peer: Peer) {
        debug!("connect({})", peer.address);

        if self.state == ConnectionState::Connecting {
            debug!("Replacing pending connection attempt");
        }
        self.cancel_connector();
        self.cancel_session();

        match self
            .adapter
            .create_outbound_socket(&peer.address, &self.settings.service)
        {
            Ok(socket) => {
                let id = self.next_role_id();
                self.connector = Some(Connector::start(
                    id,
                    peer,
                    self.adapter.clone(),
                    socket,
                    self.reports.clone(),
                ));
                self.set_state(ConnectionState::Connecting);
            }
            Err(e) => {
                warn!("Socket creation for {} failed: {}", peer.address, e);
                self.set_state(ConnectionState::Connecting);
                self.connection_failed().await;
            }
        }
    }

    async fn disconnect(&mut self) {
        debug!("disconnect()");

        self.cancel_connector();
        if let Some(session) = self.session.take() {
            session.close();
        }

        self.notice(NOTICE_DISCONNECTED);
        self.listen(self.listen_requested).await;
    }

    fn writer(&self) -> Option<SessionWriter> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        self.session.as_ref().map(Session::writer)
    }

    async fn stop(&mut self) {
        debug!("stop()");

        self.cancel_connector();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.close_acceptor().await;

        self.set_state(ConnectionState::None);
    }

    /// Turn an established stream into the single live session.
    async fn promote(&mut self, stream: BoxedStream, peer: Peer) {
        debug!("connected({})", peer.address);

        self.cancel_connector();
        self.cancel_session();
        self.close_acceptor().await;

        // Announce before the read loop starts so no data precedes the peer.
        info!("Connected to {} ({})", peer.name, peer.address);
        self.status.set_peer(peer.clone());
        self.events.emit(LinkEvent::PeerIdentified(peer.name.clone()));
        self.set_state(ConnectionState::Connected);

        let id = self.next_role_id();
        self.session = Some(Session::start(
            id,
            peer,
            stream,
            self.settings.read_buffer_size,
            self.events.clone(),
            self.reports.clone(),
        ));
    }

    async fn connection_failed(&mut self) {
        debug!("connection_failed()");
        self.notice(NOTICE_UNABLE_TO_CONNECT);
        self.listen(self.listen_requested).await;
    }

    async fn connection_lost(&mut self) {
        debug!("connection_lost()");
        self.notice(NOTICE_CONNECTION_LOST);
        self.listen(self.listen_requested).await;
    }

    fn set_state(&mut self, state: ConnectionState) {
        let previous = self.status.set_state(state);
        self.state = state;
        info!("State {} -> {}", previous, state);
        self.events.emit(LinkEvent::StateChanged(state));
    }

    fn notice(&self, text: impl Into<String>) {
        self.events.emit(LinkEvent::notice(text));
    }

    fn next_role_id(&mut self) -> RoleId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Returns once the listening socket is closed, so the service channel
    /// can be bound again straight away.
    async fn close_acceptor(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.close().await;
        }
    }

    fn cancel_connector(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.cancel();
        }
    }

    fn cancel_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.discarded.insert(session.id());
            session.cancel();
        }
    }
}

//! Scripted in-memory endpoint adapter for driving the connection manager.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot, Mutex};

use bt_terminal::bluetooth::{
    Accepted, BoxedStream, EndpointAdapter, LinkManager, LinkSettings, ListenSocket,
    OutboundSocket, Peer, PeerAddress, ServiceRecord,
};
use bt_terminal::events::EventReceiver;
use bt_terminal::{LinkError, LinkEvent};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(150);

type Inbound = io::Result<Accepted>;

/// A dial waiting for the test to decide its outcome.
pub struct PendingDial {
    pub peer: PeerAddress,
    respond: oneshot::Sender<io::Result<DuplexStream>>,
}

impl PendingDial {
    /// Complete the dial. Returns the remote end, or `None` if the
    /// connector was cancelled meanwhile.
    pub fn succeed(self) -> Option<DuplexStream> {
        let (local, remote) = tokio::io::duplex(4096);
        self.respond.send(Ok(local)).ok().map(|_| remote)
    }

    pub fn fail(self) {
        let _ = self.respond.send(Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "host is down",
        )));
    }

    /// Whether the connector stopped waiting for this dial.
    pub fn is_abandoned(&self) -> bool {
        self.respond.is_closed()
    }
}

pub struct MockAdapter {
    available: bool,
    enabled: AtomicBool,
    fail_listen: AtomicBool,
    fail_socket: AtomicBool,
    exclusive_channel: AtomicBool,
    listeners_created: AtomicUsize,
    live_listeners: Arc<AtomicUsize>,
    discovery_cancels: AtomicUsize,
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<Inbound>>>,
    dials: mpsc::UnboundedSender<PendingDial>,
}

impl MockAdapter {
    pub fn set_fail_listen(&self, fail: bool) {
        self.fail_listen.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_socket(&self, fail: bool) {
        self.fail_socket.store(fail, Ordering::SeqCst);
    }

    /// Refuse to bind while another listener still holds the channel, as
    /// RFCOMM does.
    pub fn set_exclusive_channel(&self, exclusive: bool) {
        self.exclusive_channel.store(exclusive, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn listeners_created(&self) -> usize {
        self.listeners_created.load(Ordering::SeqCst)
    }

    pub fn live_listeners(&self) -> usize {
        self.live_listeners.load(Ordering::SeqCst)
    }

    pub fn discovery_cancels(&self) -> usize {
        self.discovery_cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointAdapter for MockAdapter {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn request_enable(&self) -> bt_terminal::Result<()> {
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disable(&self) -> bt_terminal::Result<()> {
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel_discovery(&self) {
        self.discovery_cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn create_outbound_socket(
        &self,
        peer: &PeerAddress,
        _service: &ServiceRecord,
    ) -> bt_terminal::Result<Box<dyn OutboundSocket>> {
        if self.fail_socket.load(Ordering::SeqCst) {
            return Err(LinkError::InvalidAddress(peer.to_string()));
        }
        Ok(Box::new(MockOutbound {
            peer: peer.clone(),
            dials: self.dials.clone(),
        }))
    }

    async fn create_listening_socket(
        &self,
        _service: &ServiceRecord,
    ) -> bt_terminal::Result<Box<dyn ListenSocket>> {
        if self.fail_listen.load(Ordering::SeqCst) {
            return Err(LinkError::Listen(io::Error::new(
                io::ErrorKind::AddrInUse,
                "channel busy",
            )));
        }
        if self.exclusive_channel.load(Ordering::SeqCst)
            && self.live_listeners.load(Ordering::SeqCst) > 0
        {
            return Err(LinkError::Listen(io::Error::new(
                io::ErrorKind::AddrInUse,
                "channel still bound",
            )));
        }
        self.listeners_created.fetch_add(1, Ordering::SeqCst);
        self.live_listeners.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockListener {
            inbound: self.inbound.clone(),
            live: self.live_listeners.clone(),
        }))
    }
}

struct MockListener {
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<Inbound>>>,
    live: Arc<AtomicUsize>,
}

impl Drop for MockListener {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ListenSocket for MockListener {
    async fn accept_one(&self) -> io::Result<Accepted> {
        match self.inbound.lock().await.recv().await {
            Some(result) => result,
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "adapter gone")),
        }
    }
}

struct MockOutbound {
    peer: PeerAddress,
    dials: mpsc::UnboundedSender<PendingDial>,
}

#[async_trait]
impl OutboundSocket for MockOutbound {
    async fn connect(self: Box<Self>) -> io::Result<BoxedStream> {
        let (respond, outcome) = oneshot::channel();
        self.dials
            .send(PendingDial {
                peer: self.peer.clone(),
                respond,
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "test rig gone"))?;

        match outcome.await {
            Ok(Ok(stream)) => Ok(Box::new(stream)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "dial dropped")),
        }
    }
}

/// A running manager wired to a [`MockAdapter`].
pub struct Rig {
    pub manager: LinkManager,
    pub events: EventReceiver,
    pub adapter: Arc<MockAdapter>,
    inbound: mpsc::UnboundedSender<Inbound>,
    dials: mpsc::UnboundedReceiver<PendingDial>,
}

impl Rig {
    pub fn new() -> Self {
        Self::build(true, LinkSettings::default())
    }

    pub fn with_settings(settings: LinkSettings) -> Self {
        Self::build(true, settings)
    }

    pub fn unavailable() -> Self {
        Self::build(false, LinkSettings::default())
    }

    fn build(available: bool, settings: LinkSettings) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (dial_tx, dial_rx) = mpsc::unbounded_channel();
        let adapter = Arc::new(MockAdapter {
            available,
            enabled: AtomicBool::new(available),
            fail_listen: AtomicBool::new(false),
            fail_socket: AtomicBool::new(false),
            exclusive_channel: AtomicBool::new(false),
            listeners_created: AtomicUsize::new(0),
            live_listeners: Arc::new(AtomicUsize::new(0)),
            discovery_cancels: AtomicUsize::new(0),
            inbound: Arc::new(Mutex::new(inbound_rx)),
            dials: dial_tx,
        });
        let (manager, events) = LinkManager::spawn(adapter.clone(), settings);
        Self {
            manager,
            events,
            adapter,
            inbound: inbound_tx,
            dials: dial_rx,
        }
    }

    /// Queue an inbound connection; returns the remote end.
    pub fn inbound(&self, address: &str, name: &str) -> DuplexStream {
        let (local, remote) = tokio::io::duplex(4096);
        let accepted = Accepted {
            stream: Box::new(local),
            peer: Peer::new(PeerAddress::new(address), name),
        };
        self.inbound.send(Ok(accepted)).expect("inbound queue open");
        remote
    }

    /// Make the next accept fail with a transport error.
    pub fn fail_accept(&self) {
        let error = io::Error::new(io::ErrorKind::Other, "adapter reset");
        self.inbound.send(Err(error)).expect("inbound queue open");
    }

    /// Next dial attempt for `address`, skipping attempts to other peers.
    pub async fn next_dial(&mut self, address: &str) -> PendingDial {
        loop {
            let dial = tokio::time::timeout(EVENT_TIMEOUT, self.dials.recv())
                .await
                .expect("timed out waiting for dial")
                .expect("dial queue closed");
            if dial.peer.as_str() == address {
                return dial;
            }
        }
    }

    pub async fn next_event(&mut self) -> LinkEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event queue closed")
    }

    /// Assert the next events are exactly `expected`, in order.
    pub async fn expect_events(&mut self, expected: &[LinkEvent]) {
        for (i, want) in expected.iter().enumerate() {
            let got = self.next_event().await;
            assert_eq!(&got, want, "event {} of {:?}", i, expected);
        }
    }

    /// Assert nothing is emitted for a short while.
    pub async fn expect_quiet(&mut self) {
        if let Ok(Some(event)) = tokio::time::timeout(QUIET_PERIOD, self.events.recv()).await {
            panic!("unexpected event: {:?}", event);
        }
    }
}

/// Poll `check` until it holds or the event timeout passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

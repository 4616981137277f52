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

//! Connected session: read loop plus synchronous writes.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::adapter::{BoxedStream, Peer};
use super::role::{cancel_pair, CancelHandle, CancelSignal, ReportSender, RoleId, RoleReport};
use crate::events::{EventSender, LinkEvent};

/// Read chunk size used when none is configured.
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Handle to a live session.
#[derive(Debug)]
pub struct Session {
    id: RoleId,
    peer: Peer,
    writer: SessionWriter,
    closing: Arc<AtomicBool>,
    cancel: CancelHandle,
}

/// Write end of a session, cloneable so writes run outside the controller.
#[derive(Clone)]
pub struct SessionWriter {
    id: RoleId,
    output: Arc<Mutex<WriteHalf<BoxedStream>>>,
    signal: CancelSignal,
    events: EventSender,
}

impl std::fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWriter").field("id", &self.id).finish()
    }
}

impl Session {
    /// Take ownership of a connected stream and start the read loop.
    pub(crate) fn start(
        id: RoleId,
        peer: Peer,
        stream: BoxedStream,
        read_buffer: usize,
        events: EventSender,
        reports: ReportSender,
    ) -> Self {
        let (input, output) = tokio::io::split(stream);
        let (cancel, signal) = cancel_pair();
        let closing = Arc::new(AtomicBool::new(false));

        tokio::spawn(read_loop(
            id,
            input,
            read_buffer.max(1),
            closing.clone(),
            signal.clone(),
            events.clone(),
            reports,
        ));

        info!("Session {} started with {}", id, peer.name);

        Self {
            id,
            peer,
            writer: SessionWriter {
                id,
                output: Arc::new(Mutex::new(output)),
                signal,
                events,
            },
            closing,
            cancel,
        }
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn writer(&self) -> SessionWriter {
        self.writer.clone()
    }

    /// Intentional close: the read loop ends without reporting a loss.
    pub fn close(&self) {
        debug!("Session {} close()", self.id);
        self.closing.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Close the socket without marking the close as intentional, so the read
    /// loop still reports the loss.
    pub fn cancel(&self) {
        debug!("Session {} cancel()", self.id);
        self.cancel.cancel();
    }
}

impl SessionWriter {
    /// Write `data` to the peer.
    ///
    /// Emits `DataSent` on success. A failure is reported as a notice and does
    /// not tear the session down.
    pub async fn write(&self, data: Vec<u8>) {
        match self.write_all(&data).await {
            Ok(()) => self.events.emit(LinkEvent::DataSent(data)),
            Err(e) => {
                warn!("Session {} write failed: {}", self.id, e);
                self.events.emit(LinkEvent::notice(format!("write failed: {}", e)));
            }
        }
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut signal = self.signal.clone();
        if signal.is_cancelled() {
            return Err(closed_error());
        }

        let mut output = self.output.lock().await;
        tokio::select! {
            _ = signal.cancelled() => Err(closed_error()),
            result = async {
                match output.write_all(data).await {
                    Ok(()) => output.flush().await,
                    Err(e) => Err(e),
                }
            } => result,
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket closed")
}

async fn read_loop(
    id: RoleId,
    mut input: ReadHalf<BoxedStream>,
    read_buffer: usize,
    closing: Arc<AtomicBool>,
    mut signal: CancelSignal,
    events: EventSender,
    reports: ReportSender,
) {
    debug!("BEGIN read loop {}", id);

    let mut buffer = vec![0u8; read_buffer];
    loop {
        let result = tokio::select! {
            _ = signal.cancelled() => Err(closed_error()),
            result = input.read(&mut buffer) => result,
        };

        match result {
            Ok(0) => {
                debug!("Session {} read() hit end of stream", id);
                report_loss(id, &closing, &reports, io::ErrorKind::UnexpectedEof.into());
                break;
            }
            Ok(n) => events.emit(LinkEvent::DataReceived(buffer[..n].to_vec())),
            Err(error) => {
                debug!("Session {} read() failed: {}", id, error);
                report_loss(id, &closing, &reports, error);
                break;
            }
        }
    }

    debug!("END read loop {}", id);
}

fn report_loss(id: RoleId, closing: &AtomicBool, reports: &ReportSender, error: io::Error) {
    // Only an unintentional disconnect counts as a loss.
    if !closing.load(Ordering::SeqCst) {
        let _ = reports.send(RoleReport::SessionLost { id, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::PeerAddress;
    use crate::events::EventReceiver;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc;

    struct Harness {
        session: Session,
        remote: DuplexStream,
        events: EventReceiver,
        reports: mpsc::UnboundedReceiver<RoleReport>,
    }

    fn start_session(read_buffer: usize) -> Harness {
        let (local, remote) = tokio::io::duplex(4096);
        let (events_tx, events) = EventSender::channel();
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let session = Session::start(
            RoleId::first(),
            Peer::new(PeerAddress::new("AA"), "Peer1"),
            Box::new(local),
            read_buffer,
            events_tx,
            reports_tx,
        );
        Harness {
            session,
            remote,
            events,
            reports,
        }
    }

    async fn next_event(events: &mut EventReceiver) -> LinkEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_read_emits_data_received() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        h.remote.write_all(b"hello").await.unwrap();

        assert_eq!(
            next_event(&mut h.events).await,
            LinkEvent::DataReceived(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn test_reads_are_chunked_by_buffer_size() {
        let mut h = start_session(4);
        h.remote.write_all(b"abcdef").await.unwrap();

        let mut received = Vec::new();
        while received.len() < 6 {
            match next_event(&mut h.events).await {
                LinkEvent::DataReceived(chunk) => {
                    assert!(chunk.len() <= 4);
                    received.extend(chunk);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(received, b"abcdef");
    }

    #[tokio::test]
    async fn test_write_emits_data_sent() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        h.session.writer().write(vec![0x41, 0x42]).await;

        assert_eq!(
            next_event(&mut h.events).await,
            LinkEvent::DataSent(vec![0x41, 0x42])
        );
        let mut buf = [0u8; 2];
        h.remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"AB");
    }

    #[tokio::test]
    async fn test_remote_drop_reports_loss() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        drop(h.remote);

        let report = tokio::time::timeout(Duration::from_secs(1), h.reports.recv())
            .await
            .expect("timed out")
            .expect("report channel closed");
        assert!(matches!(report, RoleReport::SessionLost { .. }));
    }

    #[tokio::test]
    async fn test_close_suppresses_loss_report() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        h.session.close();

        // The read loop drops its report sender when it exits.
        let report = tokio::time::timeout(Duration::from_secs(1), h.reports.recv())
            .await
            .expect("timed out");
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_cancel_still_reports_loss() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        h.session.cancel();

        let report = tokio::time::timeout(Duration::from_secs(1), h.reports.recv())
            .await
            .expect("timed out")
            .expect("report channel closed");
        assert!(matches!(report, RoleReport::SessionLost { .. }));
    }

    #[tokio::test]
    async fn test_write_after_close_is_reported_not_sent() {
        let mut h = start_session(DEFAULT_READ_BUFFER);
        h.session.close();
        h.session.writer().write(b"late".to_vec()).await;

        match next_event(&mut h.events).await {
            LinkEvent::Notice(text) => assert!(text.starts_with("write failed")),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

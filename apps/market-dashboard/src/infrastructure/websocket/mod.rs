//! WebSocket Streaming Sessions
//!
//! Adapts an upgraded axum WebSocket to the hub's `SubscriberTransport`
//! port and drives one connection through its lifecycle:
//!
//! ```text
//! Connecting ──register + initial sync──► Active ──close/error/shutdown──► Closed
//!      └──────────── hub closed or sync failed ─────────────────────────────┘
//! ```
//!
//! The server only pushes; inbound frames are read to notice the peer going
//! away and are otherwise discarded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SubscriberTransport, TransportError};
use crate::domain::pricing::PriceSnapshot;
use crate::infrastructure::broadcast::{SharedBroadcastHub, SubscriberId};

// =============================================================================
// Transport
// =============================================================================

/// Upper bound on writing the close frame to a peer.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Write half of an upgraded WebSocket.
pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsTransport {
    /// Wrap the write half of a split socket.
    #[must_use]
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl SubscriberTransport for WsTransport {
    async fn send(&self, snapshot: &PriceSnapshot) -> Result<(), TransportError> {
        let payload = snapshot
            .to_json()
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        self.sink
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self) {
        let farewell = async {
            let mut sink = self.sink.lock().await;
            // Peer may already be gone
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, farewell).await.is_err() {
            tracing::debug!("Close frame not flushed; dropping connection");
        }
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Lifecycle state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, not yet registered or synced.
    Connecting,
    /// Registered and receiving broadcasts.
    Active,
    /// Unregistered; the transport has been released.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Hub was already shut down at registration.
    HubClosed,
    /// Initial snapshot could not be sent.
    InitialSyncFailed,
    /// Peer sent a close frame or ended the stream.
    ClientClosed,
    /// Reading from the peer failed.
    ReadError,
    /// Process is shutting down.
    Shutdown,
}

/// Summary returned when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Hub id, if registration succeeded.
    pub subscriber_id: Option<SubscriberId>,
    /// Whether the session reached `Active`.
    pub was_active: bool,
    /// Why it ended.
    pub reason: CloseReason,
}

/// One streaming connection.
pub struct SubscriberSession {
    hub: SharedBroadcastHub,
    cancel: CancellationToken,
    state: SessionState,
    was_active: bool,
}

impl SubscriberSession {
    /// Create a session in `Connecting`.
    #[must_use]
    pub const fn new(hub: SharedBroadcastHub, cancel: CancellationToken) -> Self {
        Self {
            hub,
            cancel,
            state: SessionState::Connecting,
            was_active: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Serve an upgraded socket until it closes.
    pub async fn serve(self, socket: WebSocket) -> SessionReport {
        let (sink, stream) = socket.split();
        self.run(Arc::new(WsTransport::new(sink)), stream).await
    }

    /// Drive the session over an arbitrary transport and inbound stream.
    pub async fn run<S, E>(
        mut self,
        transport: Arc<dyn SubscriberTransport>,
        mut inbound: S,
    ) -> SessionReport
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        let (handle, snapshot) = match self.hub.register(Arc::clone(&transport)) {
            Ok(registered) => registered,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting stream subscriber");
                transport.close().await;
                return self.finish(None, CloseReason::HubClosed);
            }
        };
        let id = handle.id();

        if let Err(e) = self.hub.sync(&handle, &snapshot).await {
            tracing::debug!(subscriber_id = id, error = %e, "Initial snapshot failed");
            self.hub.unregister(id).await;
            return self.finish(Some(id), CloseReason::InitialSyncFailed);
        }
        self.transition(SessionState::Active);
        tracing::info!(subscriber_id = id, sequence = snapshot.sequence(), "Stream subscriber active");

        let reason = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break CloseReason::Shutdown,
                frame = inbound.next() => match frame {
                    Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber_id = id, error = %e, "Stream read failed");
                        break CloseReason::ReadError;
                    }
                },
            }
        };

        self.hub.unregister(id).await;
        self.finish(Some(id), reason)
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Session state change");
        if next == SessionState::Active {
            self.was_active = true;
        }
        self.state = next;
    }

    fn finish(mut self, subscriber_id: Option<SubscriberId>, reason: CloseReason) -> SessionReport {
        self.transition(SessionState::Closed);
        tracing::info!(subscriber_id, reason = ?reason, "Stream subscriber closed");
        SessionReport {
            subscriber_id,
            was_active: self.was_active,
            reason,
        }
    }
}

impl std::fmt::Debug for SubscriberSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSession")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::pricing::PriceStore;
    use crate::infrastructure::broadcast::BroadcastHub;

    #[derive(Default)]
    struct RecordingTransport {
        fail: bool,
        received: SyncMutex<Vec<u64>>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl SubscriberTransport for RecordingTransport {
        async fn send(&self, snapshot: &PriceSnapshot) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.received.lock().push(snapshot.sequence());
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hub() -> SharedBroadcastHub {
        Arc::new(BroadcastHub::with_defaults(Arc::new(
            PriceStore::with_default_watchlist(),
        )))
    }

    type Frame = Result<Message, std::io::Error>;

    #[test]
    fn new_session_is_connecting() {
        let session = SubscriberSession::new(hub(), CancellationToken::new());
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn client_close_frame_ends_session() {
        let hub = hub();
        let transport = Arc::new(RecordingTransport::default());
        let inbound = stream::iter(vec![
            Frame::Ok(Message::Text("hello".into())),
            Frame::Ok(Message::Close(None)),
        ]);

        let report = SubscriberSession::new(Arc::clone(&hub), CancellationToken::new())
            .run(transport.clone(), inbound)
            .await;

        assert!(report.was_active);
        assert_eq!(report.reason, CloseReason::ClientClosed);
        assert_eq!(*transport.received.lock(), vec![0]);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn read_error_ends_session() {
        let hub = hub();
        let inbound = stream::iter(vec![Frame::Err(std::io::Error::other("reset"))]);

        let report = SubscriberSession::new(hub, CancellationToken::new())
            .run(Arc::new(RecordingTransport::default()), inbound)
            .await;

        assert_eq!(report.reason, CloseReason::ReadError);
    }

    #[tokio::test]
    async fn failed_initial_sync_skips_active() {
        let hub = hub();
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        });

        let report = SubscriberSession::new(Arc::clone(&hub), CancellationToken::new())
            .run(transport.clone(), stream::pending::<Frame>())
            .await;

        assert!(!report.was_active);
        assert_eq!(report.reason, CloseReason::InitialSyncFailed);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closed_hub_rejects_session() {
        let hub = hub();
        hub.shutdown().await;
        let transport = Arc::new(RecordingTransport::default());

        let report = SubscriberSession::new(hub, CancellationToken::new())
            .run(transport.clone(), stream::pending::<Frame>())
            .await;

        assert_eq!(report.subscriber_id, None);
        assert_eq!(report.reason, CloseReason::HubClosed);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_transport_once() {
        let hub = hub();
        let cancel = CancellationToken::new();
        let transport = Arc::new(RecordingTransport::default());
        let (_tx, rx) = mpsc::unbounded_channel::<Frame>();
        let inbound = channel_stream(rx);

        let task = tokio::spawn(
            SubscriberSession::new(Arc::clone(&hub), cancel.clone()).run(transport.clone(), inbound),
        );
        while hub.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }

        hub.shutdown().await;
        cancel.cancel();
        let report = task.await.unwrap();

        assert_eq!(report.reason, CloseReason::Shutdown);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    fn channel_stream(
        rx: mpsc::UnboundedReceiver<Frame>,
    ) -> impl Stream<Item = Frame> + Unpin {
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }))
    }
}

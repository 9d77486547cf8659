/// WebSocket transport session for the live event channel.
/// Owns a single connection, remembers the joined room, queues envelopes while
/// the room is not deliverable, and reconnects with bounded backoff.

use crate::config::ReconnectPolicy;
use crate::error::{ClientError, Result};
use crate::models::{ClientFrame, Envelope, InboundFrame};
use futures::future::{BoxFuture, FutureExt};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

/// Connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Live; `room` is the room joined on this connection
    Connected { room: Option<String> },
    /// Connection lost; `room` is re-joined once it comes back
    Reconnecting { room: Option<String> },
}

impl ConnectionState {
    /// Envelopes are only written once the room join went out on the live connection
    pub fn is_deliverable(&self) -> bool {
        matches!(self, ConnectionState::Connected { room: Some(_) })
    }
}

type EventHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

struct Link {
    state: ConnectionState,
    /// Room to (re)join
    room: Option<String>,
    writer: Option<mpsc::UnboundedSender<ClientFrame>>,
    /// Envelopes waiting for a deliverable connection, in submission order
    queue: VecDeque<Envelope>,
    /// Bumped per connection; tasks of older connections stand down
    generation: u64,
    /// Set by `disconnect`; stops reconnection and rejects sends
    closed: bool,
}

struct Shared {
    endpoint: String,
    policy: ReconnectPolicy,
    link: Mutex<Link>,
    handlers: StdMutex<HashMap<String, EventHandler>>,
    state_tx: watch::Sender<ConnectionState>,
}

/// WebSocket manager handling connection and event routing
#[derive(Clone)]
pub struct WebSocketManager {
    shared: Arc<Shared>,
}

impl WebSocketManager {
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        WebSocketManager {
            shared: Arc::new(Shared {
                endpoint: endpoint.into(),
                policy,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    room: None,
                    writer: None,
                    queue: VecDeque::new(),
                    generation: 0,
                    closed: false,
                }),
                handlers: StdMutex::new(HashMap::new()),
                state_tx,
            }),
        }
    }

    /// Open the connection. A single attempt; reconnection only kicks in once connected.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut link = self.shared.link.lock().await;
            if link.state != ConnectionState::Disconnected {
                return Err(ClientError::State(
                    "WebSocket already connecting or connected".to_string(),
                ));
            }
            link.closed = false;
            self.set_state(&mut link, ConnectionState::Connecting);
        }

        match self.open().await {
            Ok(()) => {
                log::info!("WebSocket connected to {}", self.shared.endpoint);
                Ok(())
            }
            Err(e) => {
                let mut link = self.shared.link.lock().await;
                if !link.closed {
                    self.set_state(&mut link, ConnectionState::Disconnected);
                }
                Err(ClientError::Connection(format!(
                    "Failed to connect to {}: {}",
                    self.shared.endpoint, e
                )))
            }
        }
    }

    /// Manual reconnection after the backoff loop gave up. Queued envelopes survive.
    pub async fn reconnect(&self) -> Result<()> {
        self.connect().await
    }

    /// Establish the socket, re-join the room, flush the queue, spawn I/O tasks
    async fn open(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(self.shared.endpoint.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ClientFrame>();

        let generation = {
            let mut link = self.shared.link.lock().await;
            if link.closed {
                return Err(ClientError::State(
                    "Session disconnected while connecting".to_string(),
                ));
            }

            link.generation += 1;
            link.writer = Some(frame_tx);

            let room = link.room.clone();
            if let Some(room) = &room {
                if let Some(writer) = &link.writer {
                    let _ = writer.send(ClientFrame::JoinRoom(room.clone()));
                }
                log::debug!("Joining room {} on new connection", room);
            }
            self.set_state(&mut link, ConnectionState::Connected { room });
            Self::flush_locked(&mut link);
            link.generation
        };

        // Outgoing frames
        let shared = self.shared.clone();
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("Failed to encode {} frame: {}", frame.event_name(), e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(WsMessage::Text(text.into())).await {
                    log::error!("Failed to send WebSocket frame: {}", e);
                    frame_rx.close();
                    let mut unsent = vec![frame];
                    while let Ok(frame) = frame_rx.try_recv() {
                        unsent.push(frame);
                    }
                    Self::requeue(&shared, unsent).await;
                    return;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Incoming frames, dispatched in receipt order
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => manager.dispatch(&text),
                    Ok(WsMessage::Close(_)) => {
                        log::info!("WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        log::warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            manager.handle_connection_lost(generation).await;
        });

        Ok(())
    }

    /// Put envelopes that never made it onto the wire back at the head of the queue
    async fn requeue(shared: &Shared, unsent: Vec<ClientFrame>) {
        let mut link = shared.link.lock().await;
        if link.closed {
            return;
        }
        let envelopes: Vec<Envelope> = unsent
            .into_iter()
            .filter_map(|frame| match frame {
                ClientFrame::SendMessage(envelope) => Some(envelope),
                ClientFrame::JoinRoom(_) => None,
            })
            .collect();
        if envelopes.is_empty() {
            return;
        }
        log::warn!("Re-queueing {} unsent envelopes", envelopes.len());
        for envelope in envelopes.into_iter().rev() {
            link.queue.push_front(envelope);
        }
        Self::flush_locked(&mut link);
    }

    /// Boxed: `open` spawns the reader task that lands here, and this loops back into `open`
    fn handle_connection_lost(&self, generation: u64) -> BoxFuture<'static, ()> {
        let manager = self.clone();
        async move {
            {
                let mut link = manager.shared.link.lock().await;
                if link.closed || link.generation != generation {
                    return;
                }
                link.writer = None;
                let room = link.room.clone();
                manager.set_state(&mut link, ConnectionState::Reconnecting { room });
            }
            log::warn!("WebSocket connection lost, reconnecting");
            manager.reconnect_with_backoff().await;
        }
        .boxed()
    }

    /// Reconnect with exponential backoff, bounded by the policy
    async fn reconnect_with_backoff(&self) {
        let policy = &self.shared.policy;

        for attempt in 0..policy.max_attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
            if self.shared.link.lock().await.closed {
                return;
            }

            match self.open().await {
                Ok(()) => {
                    log::info!("WebSocket reconnected after {} attempt(s)", attempt + 1);
                    return;
                }
                Err(e) => {
                    log::warn!("WebSocket reconnection attempt {} failed: {}", attempt + 1, e);
                }
            }
        }

        let mut link = self.shared.link.lock().await;
        if !link.closed {
            log::error!(
                "Giving up after {} reconnection attempts; {} envelope(s) stay queued",
                policy.max_attempts,
                link.queue.len()
            );
            self.set_state(&mut link, ConnectionState::Disconnected);
        }
    }

    /// Join a room. Re-joining the room already joined is a no-op.
    pub async fn join_room(&self, room: &str) -> Result<()> {
        let mut link = self.shared.link.lock().await;
        if link.closed {
            return Err(ClientError::State("Session is disconnected".to_string()));
        }

        link.room = Some(room.to_string());
        match link.state.clone() {
            ConnectionState::Connected { room: joined } => {
                if joined.as_deref() == Some(room) {
                    log::debug!("Already joined room {}", room);
                    return Ok(());
                }
                if let Some(writer) = &link.writer {
                    let _ = writer.send(ClientFrame::JoinRoom(room.to_string()));
                }
                log::info!("Joined room {}", room);
                self.set_state(
                    &mut link,
                    ConnectionState::Connected {
                        room: Some(room.to_string()),
                    },
                );
                Self::flush_locked(&mut link);
            }
            ConnectionState::Reconnecting { .. } => {
                self.set_state(
                    &mut link,
                    ConnectionState::Reconnecting {
                        room: Some(room.to_string()),
                    },
                );
            }
            // Joined as soon as a connection comes up
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }
        Ok(())
    }

    /// Fire-and-forget send. Queued unless the joined room is live.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        let mut link = self.shared.link.lock().await;
        if link.closed {
            return Err(ClientError::State("Session is disconnected".to_string()));
        }

        link.queue.push_back(envelope);
        if link.state.is_deliverable() {
            Self::flush_locked(&mut link);
        } else {
            log::debug!(
                "Queued envelope while {:?} ({} pending)",
                link.state,
                link.queue.len()
            );
        }
        Ok(())
    }

    fn flush_locked(link: &mut Link) {
        if !link.state.is_deliverable() {
            return;
        }
        let Some(writer) = link.writer.clone() else {
            return;
        };

        while let Some(envelope) = link.queue.pop_front() {
            if let Err(mpsc::error::SendError(frame)) =
                writer.send(ClientFrame::SendMessage(envelope))
            {
                if let ClientFrame::SendMessage(envelope) = frame {
                    link.queue.push_front(envelope);
                }
                break;
            }
        }
    }

    /// Register the handler for `event`, replacing any previous one
    pub fn subscribe<T, F>(&self, event: &str, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let event_name = event.to_string();
        let wrapped: EventHandler = Arc::new(move |data| {
            match serde_json::from_value::<T>(data) {
                Ok(payload) => handler(payload),
                Err(e) => log::warn!("Discarding malformed {} payload: {}", event_name, e),
            }
        });

        if self.handlers().insert(event.to_string(), wrapped).is_some() {
            log::debug!("Replaced existing handler for {}", event);
        }
    }

    /// Remove the handler for `event`; returns whether one was registered
    pub fn unsubscribe(&self, event: &str) -> bool {
        self.handlers().remove(event).is_some()
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<String, EventHandler>> {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Route an inbound text frame to its handler
    fn dispatch(&self, text: &str) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Failed to parse inbound frame: {}", e);
                return;
            }
        };

        let handler = self.handlers().get(&frame.event).cloned();
        match handler {
            Some(handler) => handler(frame.data),
            None => log::debug!("No handler for event {}", frame.event),
        }
    }

    /// Release the connection, drop queued envelopes and all handlers
    pub async fn disconnect(&self) {
        {
            let mut link = self.shared.link.lock().await;
            link.closed = true;
            link.generation += 1;
            link.writer = None;
            link.room = None;
            if !link.queue.is_empty() {
                log::info!("Discarding {} queued envelope(s)", link.queue.len());
                link.queue.clear();
            }
            self.set_state(&mut link, ConnectionState::Disconnected);
        }
        self.handlers().clear();
        log::info!("WebSocket disconnected from {}", self.shared.endpoint);
    }

    fn set_state(&self, link: &mut Link, state: ConnectionState) {
        if link.state != state {
            log::debug!("Connection state {:?} -> {:?}", link.state, state);
        }
        link.state = state.clone();
        self.shared.state_tx.send_replace(state);
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected { .. })
    }

    pub async fn queued_len(&self) -> usize {
        self.shared.link.lock().await.queue.len()
    }

    pub async fn room(&self) -> Option<String> {
        self.shared.link.lock().await.room.clone()
    }
}

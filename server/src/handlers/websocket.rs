/// WebSocket handler for real-time room delivery.
/// Manages client connections, room membership, and message broadcasting.
///
/// Frames are `{"event": <name>, "data": <payload>}`. Clients send `join_room`
/// and `send_message`; the server answers with `receive_message` to every
/// member of the sender's room, sender included.

use crate::db::models::Envelope;
use crate::db::{Database, DbPool};
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::RwLock;

pub const RECEIVE_MESSAGE: &str = "receive_message";

/// Frames pushed from the server state to a connection actor
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "()")]
pub enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientFrame {
    JoinRoom(String),
    SendMessage(Envelope),
}

/// WebSocket server state - manages client connections and room routing
pub struct WsServer {
    pub clients: Arc<RwLock<HashMap<String, UnboundedSender<Outbound>>>>,
    pub rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    /// Room each client is currently in
    pub memberships: Arc<RwLock<HashMap<String, String>>>,
    pub pool: web::Data<DbPool>,
}

impl WsServer {
    pub fn new(pool: web::Data<DbPool>) -> Self {
        WsServer {
            clients: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            memberships: Arc::new(RwLock::new(HashMap::new())),
            pool,
        }
    }

    /// Register a client connection
    pub async fn register(&self, client_id: String, tx: UnboundedSender<Outbound>) {
        let mut clients = self.clients.write().await;
        clients.insert(client_id, tx);
    }

    /// Unregister a client connection and drop its room membership
    pub async fn unregister(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        self.leave_current_room(client_id).await;
    }

    /// Put a client in `room`, leaving whatever room it was in before
    pub async fn join(&self, client_id: &str, room: &str) {
        self.leave_current_room(client_id).await;

        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(client_id.to_string());
        self.memberships
            .write()
            .await
            .insert(client_id.to_string(), room.to_string());

        log::info!("Client {} joined room {}", client_id, room);
    }

    async fn leave_current_room(&self, client_id: &str) {
        let Some(previous) = self.memberships.write().await.remove(client_id) else {
            return;
        };
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&previous) {
            members.remove(client_id);
            if members.is_empty() {
                rooms.remove(&previous);
            }
        }
    }

    pub async fn room_of(&self, client_id: &str) -> Option<String> {
        self.memberships.read().await.get(client_id).cloned()
    }

    /// Broadcast a frame to all clients in a room
    pub async fn broadcast_to_room(&self, room: &str, message: &str) {
        let rooms = self.rooms.read().await;
        if let Some(members) = rooms.get(room) {
            let clients = self.clients.read().await;
            for member in members {
                if let Some(tx) = clients.get(member) {
                    let _ = tx.send(Outbound::Text(message.to_string()));
                }
            }
        }
    }

    async fn send_error(&self, client_id: &str, reason: &str) {
        if let Some(tx) = self.clients.read().await.get(client_id) {
            let frame = json!({ "event": "error", "data": reason }).to_string();
            let _ = tx.send(Outbound::Text(frame));
        }
    }

    /// Handle one text frame from a client
    pub async fn handle_frame(&self, client_id: &str, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to parse WebSocket message from {}: {}", client_id, e);
                self.send_error(client_id, "Invalid message format").await;
                return;
            }
        };

        match frame {
            ClientFrame::JoinRoom(room) => {
                if room.trim().is_empty() {
                    self.send_error(client_id, "Room name is required").await;
                    return;
                }
                self.join(client_id, &room).await;
            }
            ClientFrame::SendMessage(envelope) => {
                let Some(room) = self.room_of(client_id).await else {
                    log::warn!("Client {} sent a message before joining a room", client_id);
                    self.send_error(client_id, "Join a room first").await;
                    return;
                };

                match Database::store_message(&self.pool, &room, envelope).await {
                    Ok(message) => {
                        let frame = json!({ "event": RECEIVE_MESSAGE, "data": message }).to_string();
                        self.broadcast_to_room(&room, &frame).await;
                    }
                    Err(e) => {
                        log::warn!("Rejected message from {}: {}", client_id, e);
                        self.send_error(client_id, &e.to_string()).await;
                    }
                }
            }
        }
    }

    /// Close every open connection; returns how many were told to close
    pub async fn disconnect_all(&self) -> usize {
        let clients = self.clients.read().await;
        for tx in clients.values() {
            let _ = tx.send(Outbound::Close);
        }
        log::info!("Closing {} connections", clients.len());
        clients.len()
    }
}

/// WebSocket actor for individual client connections
pub struct WsActor {
    pub client_id: String,
    pub server: web::Data<WsServer>,
    /// Frames are handed to one task per connection so they are handled in arrival order
    inbox: Option<UnboundedSender<String>>,
}

impl WsActor {
    pub fn new(client_id: String, server: web::Data<WsServer>) -> Self {
        WsActor {
            client_id,
            server,
            inbox: None,
        }
    }
}

impl Actor for WsActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!("WebSocket connection started: {}", self.client_id);
        let (out_tx, mut out_rx) = unbounded_channel::<Outbound>();

        let addr = ctx.address();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                addr.do_send(msg);
            }
        });

        let (in_tx, mut in_rx) = unbounded_channel::<String>();
        self.inbox = Some(in_tx);

        let server = self.server.clone();
        let client_id = self.client_id.clone();
        tokio::spawn(async move {
            server.register(client_id.clone(), out_tx).await;
            while let Some(text) = in_rx.recv().await {
                server.handle_frame(&client_id, &text).await;
            }
            server.unregister(&client_id).await;
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!("WebSocket connection stopped: {}", self.client_id);
        // Closing the inbox lets the frame task finish and unregister
        self.inbox.take();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                if let Some(inbox) = &self.inbox {
                    let _ = inbox.send(text.to_string());
                }
            }
            Ok(ws::Message::Ping(payload)) => {
                ctx.pong(&payload);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<Outbound> for WsActor {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match msg {
            Outbound::Text(text) => ctx.text(text),
            Outbound::Close => {
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Away,
                    description: None,
                }));
                ctx.stop();
            }
        }
    }
}

/// WebSocket connection handler
/// GET /ws
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<WsServer>,
) -> actix_web::Result<HttpResponse> {
    let client_id = uuid::Uuid::new_v4().to_string();
    let actor = WsActor::new(client_id, server.clone());

    let resp = ws::start(actor, &req, stream)?;
    Ok(resp)
}

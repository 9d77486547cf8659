//! Common test utilities and helpers for integration tests
//! Provides an in-process chat server plus builders for messages and users
#![allow(dead_code)]

use actix_web::{web, App, HttpResponse, HttpServer};
use room_chat_client::config::{ClientConfig, ReconnectPolicy};
use room_chat_client::models::{Message, MessageId, MessageKind, User};
use room_chat_server::handlers::WsServer;
use std::time::Duration;

/// A running test server and the handles tests poke at
pub struct TestServer {
    pub addr: String,
    pub ws_server: web::Data<WsServer>,
    pub pool: web::Data<room_chat_server::db::DbPool>,
}

impl TestServer {
    /// Start a server with a fresh store on a random port
    pub async fn start() -> Self {
        let pool = web::Data::new(room_chat_server::db::create_test_pool());
        let ws_server = web::Data::new(WsServer::new(pool.clone()));
        let (server, addr) =
            room_chat_server::server::create_test_http_server_with(pool.clone(), ws_server.clone())
                .expect("Failed to create test server");
        tokio::spawn(server);

        // Give server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestServer {
            addr,
            ws_server,
            pool,
        }
    }

    /// Like `start`, but every history request fails with a 500
    pub async fn start_with_failing_history() -> Self {
        let pool = web::Data::new(room_chat_server::db::create_test_pool());
        let ws_server = web::Data::new(WsServer::new(pool.clone()));
        let (app_pool, app_ws_server) = (pool.clone(), ws_server.clone());

        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_pool.clone())
                .app_data(app_ws_server.clone())
                // Registered first, so it shadows the real history route
                .route(
                    "/api/messages",
                    web::get().to(|| async { HttpResponse::InternalServerError().finish() }),
                )
                .configure(room_chat_server::server::configure_routes)
        })
        .workers(1)
        .bind("127.0.0.1:0")
        .expect("Failed to bind test server");
        let addr = server.addrs()[0].to_string();
        tokio::spawn(server.run());

        tokio::time::sleep(Duration::from_millis(100)).await;

        TestServer {
            addr,
            ws_server,
            pool,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait until the server has `count` connections in `room`
    pub async fn wait_for_members(&self, room: &str, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let members = self
                .ws_server
                .rooms
                .read()
                .await
                .get(room)
                .map_or(0, |members| members.len());
            if members == count {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "room {} has {} members, expected {}",
                room,
                members,
                count
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Wait until the server has exactly `count` open connections
    pub async fn wait_for_clients(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let clients = self.ws_server.clients.read().await.len();
            if clients == count {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "server has {} connections, expected {}",
                clients,
                count
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Client config pointing at this server with a fast reconnect policy
    pub fn config(&self, room: &str) -> ClientConfig {
        ClientConfig::new(self.url())
            .with_room(room)
            .with_reconnect(fast_reconnect())
    }
}

/// Short enough for tests, long enough to observe `Reconnecting`
pub fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(300),
        max_delay: Duration::from_millis(1000),
        max_attempts: 5,
    }
}

/// Poll `check` until it holds or the timeout passes
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Helper for creating test messages
pub struct TestMessageBuilder {
    id: Option<String>,
    room: Option<String>,
    kind: MessageKind,
    body: String,
    sender: User,
}

impl Default for TestMessageBuilder {
    fn default() -> Self {
        TestMessageBuilder {
            id: None,
            room: None,
            kind: MessageKind::Text,
            body: "hello".to_string(),
            sender: User::new("u1", "alice"),
        }
    }
}

impl TestMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }

    pub fn text(mut self, body: &str) -> Self {
        self.kind = MessageKind::Text;
        self.body = body.to_string();
        self
    }

    pub fn media(mut self, kind: MessageKind, url: &str) -> Self {
        self.kind = kind;
        self.body = url.to_string();
        self
    }

    pub fn sender(mut self, sender: &User) -> Self {
        self.sender = sender.clone();
        self
    }

    pub fn build(self) -> Message {
        let (content, media_url) = match self.kind {
            MessageKind::Text => (Some(self.body), None),
            MessageKind::Image | MessageKind::Video => (None, Some(self.body)),
        };
        Message {
            id: self.id.map(MessageId::new),
            room: self.room,
            content,
            media_url,
            kind: self.kind,
            sender_id: self.sender.id,
            sender_name: self.sender.username,
            created_at: None,
        }
    }
}

pub fn text_contents(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| m.content.clone())
        .collect()
}

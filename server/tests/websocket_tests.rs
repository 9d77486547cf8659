/// Integration tests for the WebSocket relay state
/// Exercises room membership and broadcast through `WsServer::handle_frame`
use actix_web::web;
use room_chat_server::db::{self, Database};
use room_chat_server::handlers::{Outbound, WsServer};
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

async fn connect(server: &WsServer, client_id: &str) -> UnboundedReceiver<Outbound> {
    let (tx, rx) = unbounded_channel();
    server.register(client_id.to_string(), tx).await;
    rx
}

fn frame(rx: &mut UnboundedReceiver<Outbound>) -> Value {
    match rx.try_recv() {
        Ok(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {:?}", other),
    }
}

fn send_text(text: &str, sender: &str) -> String {
    json!({
        "event": "send_message",
        "data": {
            "content": text,
            "type": "text",
            "senderId": sender,
            "senderName": sender
        }
    })
    .to_string()
}

fn join(room: &str) -> String {
    json!({ "event": "join_room", "data": room }).to_string()
}

#[tokio::test]
async fn test_broadcast_reaches_room_including_sender() {
    let pool = web::Data::new(db::create_test_pool());
    let server = WsServer::new(pool.clone());

    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;
    let mut carol = connect(&server, "carol").await;

    server.handle_frame("alice", &join("general")).await;
    server.handle_frame("bob", &join("general")).await;
    server.handle_frame("carol", &join("random")).await;

    server.handle_frame("alice", &send_text("hi", "alice")).await;

    let to_alice = frame(&mut alice);
    let to_bob = frame(&mut bob);
    assert_eq!(to_alice["event"], "receive_message");
    assert_eq!(to_alice["data"]["content"], "hi");
    assert_eq!(to_alice["data"]["senderName"], "alice");
    assert_eq!(to_alice["data"]["room"], "general");
    assert_eq!(to_alice, to_bob);
    assert!(to_alice["data"]["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(carol.try_recv().is_err());

    let history = Database::get_room_messages(&pool, "general").await;
    assert_eq!(history.len(), 1);
    assert_eq!(to_alice["data"]["id"], history[0].id);
}

#[tokio::test]
async fn test_switching_rooms_stops_old_delivery() {
    let server = WsServer::new(web::Data::new(db::create_test_pool()));

    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    server.handle_frame("alice", &join("general")).await;
    server.handle_frame("bob", &join("general")).await;
    server.handle_frame("bob", &join("random")).await;

    server.handle_frame("alice", &send_text("anyone?", "alice")).await;

    assert_eq!(frame(&mut alice)["data"]["content"], "anyone?");
    assert!(bob.try_recv().is_err());
}

#[tokio::test]
async fn test_messages_keep_submission_order() {
    let pool = web::Data::new(db::create_test_pool());
    let server = WsServer::new(pool.clone());
    let mut alice = connect(&server, "alice").await;
    server.handle_frame("alice", &join("general")).await;

    for text in ["one", "two", "three"] {
        server.handle_frame("alice", &send_text(text, "alice")).await;
    }

    let received: Vec<_> = (0..3)
        .map(|_| frame(&mut alice)["data"]["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(received, vec!["one", "two", "three"]);

    let stored: Vec<_> = Database::get_room_messages(&pool, "general")
        .await
        .into_iter()
        .filter_map(|m| m.content)
        .collect();
    assert_eq!(stored, received);
}

#[tokio::test]
async fn test_send_before_join_is_rejected() {
    let pool = web::Data::new(db::create_test_pool());
    let server = WsServer::new(pool.clone());
    let mut alice = connect(&server, "alice").await;

    server.handle_frame("alice", &send_text("hello?", "alice")).await;

    assert_eq!(frame(&mut alice)["event"], "error");
    assert!(Database::get_room_messages(&pool, "general").await.is_empty());
}

#[tokio::test]
async fn test_media_without_url_is_rejected() {
    let server = WsServer::new(web::Data::new(db::create_test_pool()));
    let mut alice = connect(&server, "alice").await;
    server.handle_frame("alice", &join("general")).await;

    let bad = json!({
        "event": "send_message",
        "data": { "type": "image", "senderId": "alice", "senderName": "alice" }
    })
    .to_string();
    server.handle_frame("alice", &bad).await;

    assert_eq!(frame(&mut alice)["event"], "error");
}

/// End-to-end tests for `ChatSession` against a real server
/// History plus live delivery, media messages, room switching, recovery and logout
mod common;

use common::{eventually, text_contents, TestServer};
use room_chat_client::config::ReconnectPolicy;
use room_chat_client::error::ClientError;
use room_chat_client::models::MessageKind;
use room_chat_client::services::{ConnectionState, MediaAsset};
use room_chat_client::ChatSession;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

async fn login(server: &TestServer, username: &str, room: &str) -> ChatSession {
    ChatSession::login(server.config(room), username, "pw")
        .await
        .expect("login should succeed")
}

#[tokio::test]
async fn test_text_reaches_everyone_in_room() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;
    let bob = login(&server, "bob", "general").await;
    server.wait_for_members("general", 2).await;

    alice.submit_text("hello bob").await.unwrap();

    assert!(eventually(WAIT, || alice.messages().len() == 1).await);
    assert!(eventually(WAIT, || bob.messages().len() == 1).await);

    let seen_by_bob = &bob.messages()[0];
    assert_eq!(seen_by_bob.content.as_deref(), Some("hello bob"));
    assert_eq!(seen_by_bob.sender_name, "alice");
    assert!(seen_by_bob.is_from(alice.user()));
    assert!(!seen_by_bob.is_from(bob.user()));
}

#[tokio::test]
async fn test_late_joiner_sees_history_then_live() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;

    alice.submit_text("one").await.unwrap();
    alice.submit_text("two").await.unwrap();
    assert!(eventually(WAIT, || alice.messages().len() == 2).await);

    let bob = login(&server, "bob", "general").await;
    assert_eq!(text_contents(&bob.messages()), vec!["one", "two"]);
    server.wait_for_members("general", 2).await;

    alice.submit_text("three").await.unwrap();
    assert!(eventually(WAIT, || bob.messages().len() == 3).await);
    assert_eq!(text_contents(&bob.messages()), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_blank_text_sends_nothing() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;

    alice.submit_text("   ").await.unwrap();
    alice.submit_text("").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(alice.messages().is_empty());
    let history = room_chat_server::db::Database::get_room_messages(&server.pool, "general").await;
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_media_message_round_trip() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;
    let bob = login(&server, "bob", "general").await;
    server.wait_for_members("general", 2).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip");
    std::fs::write(&path, b"video bytes").unwrap();

    let asset = MediaAsset::new(format!("file://{}", path.display())).with_type("video");
    let upload = alice.submit_asset(&asset).await.unwrap();
    assert_eq!(upload.kind, MessageKind::Video);

    assert!(eventually(WAIT, || bob.messages().len() == 1).await);
    let message = &bob.messages()[0];
    assert_eq!(message.kind, MessageKind::Video);
    assert_eq!(message.media_url.as_deref(), Some(upload.resource_url.as_str()));
    assert!(message.content.is_none());
}

#[tokio::test]
async fn test_failed_upload_sends_no_message() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;

    let result = alice.submit_asset(&MediaAsset::new("/no/such/file.png")).await;
    assert!(matches!(result, Err(ClientError::UploadFailed(_))));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(alice.messages().is_empty());
}

#[tokio::test]
async fn test_enter_room_replaces_messages() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;
    let bob = login(&server, "bob", "random").await;

    bob.submit_text("in random").await.unwrap();
    assert!(eventually(WAIT, || bob.messages().len() == 1).await);

    alice.submit_text("in general").await.unwrap();
    assert!(eventually(WAIT, || alice.messages().len() == 1).await);

    alice.enter_room("random").await.unwrap();
    assert_eq!(alice.store().room().as_deref(), Some("random"));
    assert_eq!(text_contents(&alice.messages()), vec!["in random"]);
    server.wait_for_members("random", 2).await;

    bob.submit_text("welcome").await.unwrap();
    assert!(eventually(WAIT, || alice.messages().len() == 2).await);
    assert_eq!(text_contents(&alice.messages()), vec!["in random", "welcome"]);
}

#[tokio::test]
async fn test_logout_clears_state() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;

    alice.submit_text("bye").await.unwrap();
    assert!(eventually(WAIT, || alice.messages().len() == 1).await);

    alice.logout().await;

    assert!(alice.messages().is_empty());
    assert_eq!(alice.connection_state(), ConnectionState::Disconnected);
    assert!(alice.submit_text("after logout").await.is_err());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = TestServer::start().await;
    let _alice = login(&server, "alice", "general").await;

    let result = ChatSession::login(server.config("general"), "alice", "not-pw").await;
    assert!(matches!(result, Err(ClientError::Auth(_))));
}

#[tokio::test]
async fn test_session_survives_server_side_disconnect() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;

    let mut states = alice.watch_connection();
    server.ws_server.disconnect_all().await;
    tokio::time::timeout(
        WAIT,
        states.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
    )
    .await
    .expect("alice should notice the drop")
    .expect("state channel closed");

    alice.submit_text("sent while reconnecting").await.unwrap();

    assert!(eventually(WAIT, || alice.messages().len() == 1).await);
    assert_eq!(text_contents(&alice.messages()), vec!["sent while reconnecting"]);

    let history = room_chat_server::db::Database::get_room_messages(&server.pool, "general").await;
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_switching_rooms_ignores_old_room_traffic() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;
    let bob = login(&server, "bob", "general").await;
    server.wait_for_members("general", 2).await;

    // Bob keeps talking in general while alice moves out
    let chatter = tokio::spawn(async move {
        for i in 0..200 {
            bob.submit_text(&format!("general-{}", i)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        bob
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    alice.enter_room("random").await.unwrap();
    let bob = chatter.await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(alice.store().room().as_deref(), Some("random"));
    let leaked: Vec<String> = text_contents(&alice.messages())
        .into_iter()
        .filter(|text| text.starts_with("general-"))
        .collect();
    assert!(leaked.is_empty(), "general messages in random: {:?}", leaked);

    bob.enter_room("random").await.unwrap();
    server.wait_for_members("random", 2).await;
    bob.submit_text("over here").await.unwrap();

    assert!(eventually(WAIT, || alice.messages().len() == 1).await);
    assert_eq!(text_contents(&alice.messages()), vec!["over here"]);
    assert_eq!(alice.messages()[0].room.as_deref(), Some("random"));
}

#[tokio::test]
async fn test_messages_sent_during_outage_are_recovered() {
    let server = TestServer::start().await;
    let slow = ReconnectPolicy {
        initial_delay: Duration::from_millis(1500),
        max_delay: Duration::from_millis(2000),
        max_attempts: 5,
    };
    let alice = ChatSession::login(server.config("general").with_reconnect(slow), "alice", "pw")
        .await
        .expect("login should succeed");
    server.wait_for_members("general", 1).await;

    let mut states = alice.watch_connection();
    server.ws_server.disconnect_all().await;
    tokio::time::timeout(
        WAIT,
        states.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
    )
    .await
    .expect("alice should notice the drop")
    .expect("state channel closed");

    // Bob arrives and talks while alice is still backing off
    let bob = login(&server, "bob", "general").await;
    bob.submit_text("sent during outage").await.unwrap();
    assert!(eventually(WAIT, || bob.messages().len() == 1).await);
    assert!(alice.messages().is_empty());

    assert!(
        eventually(WAIT, || text_contents(&alice.messages()) == vec!["sent during outage"]).await
    );
    server.wait_for_members("general", 2).await;

    bob.submit_text("after").await.unwrap();
    assert!(eventually(WAIT, || alice.messages().len() == 2).await);
    assert_eq!(
        text_contents(&alice.messages()),
        vec!["sent during outage", "after"]
    );
}

#[tokio::test]
async fn test_failed_start_releases_connection() {
    let server = TestServer::start_with_failing_history().await;

    let result = ChatSession::login(server.config("general"), "alice", "pw").await;
    assert!(matches!(result, Err(ClientError::Server(_))));

    // Long enough for a leaked connection to have registered and joined
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.wait_for_clients(0).await;
    server.wait_for_members("general", 0).await;
}

#[tokio::test]
async fn test_dropping_session_closes_connection() {
    let server = TestServer::start().await;
    let alice = login(&server, "alice", "general").await;
    server.wait_for_members("general", 1).await;

    drop(alice);

    server.wait_for_clients(0).await;
    server.wait_for_members("general", 0).await;
}

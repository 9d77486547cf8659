/// In-memory storage for the chat server.
/// Holds users, per-room message history and uploaded media for the life of the process.

pub mod models;

use chrono::Utc;
use models::{Envelope, Message, MessageKind, StoredUpload, User};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryDb {
    users: HashMap<String, User>,
    rooms: HashMap<String, Vec<Message>>,
    uploads: HashMap<String, StoredUpload>,
}

pub type DbPool = Arc<Mutex<MemoryDb>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DbError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Create the shared store
pub fn create_pool() -> DbPool {
    Arc::new(Mutex::new(MemoryDb::default()))
}

/// Create a fresh store for tests
pub fn create_test_pool() -> DbPool {
    create_pool()
}

/// Database operations
pub struct Database;

impl Database {
    /// Log a user in, registering the username on first use
    pub async fn login(pool: &DbPool, username: &str, password: &str) -> DbResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DbError::InvalidInput("username is required".to_string()));
        }

        let mut db = pool.lock().await;
        if let Some(user) = db.users.get(username) {
            if user.password != password {
                return Err(DbError::InvalidCredentials);
            }
            return Ok(user.clone());
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: password.to_string(),
            created_at: Utc::now(),
        };
        db.users.insert(username.to_string(), user.clone());
        log::info!("Registered user {}", username);
        Ok(user)
    }

    /// Assign an id and timestamp to a submitted message and append it to the room
    pub async fn store_message(pool: &DbPool, room: &str, envelope: Envelope) -> DbResult<Message> {
        envelope.validate().map_err(DbError::InvalidInput)?;

        // Exactly one of content/fileUrl survives, matching the kind
        let (content, file_url) = if envelope.kind.is_media() {
            (None, envelope.file_url)
        } else {
            (envelope.content, None)
        };

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.to_string(),
            content,
            kind: envelope.kind,
            file_url,
            sender_id: envelope.sender_id,
            sender_name: envelope.sender_name,
            created_at: Utc::now(),
        };

        let mut db = pool.lock().await;
        db.rooms
            .entry(room.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Room history, oldest first
    pub async fn get_room_messages(pool: &DbPool, room: &str) -> Vec<Message> {
        pool.lock()
            .await
            .rooms
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    /// Store uploaded bytes under a generated name
    pub async fn store_upload(
        pool: &DbPool,
        extension: Option<&str>,
        content_type: &str,
        kind: MessageKind,
        bytes: Vec<u8>,
    ) -> StoredUpload {
        let name = match extension {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let upload = StoredUpload {
            name: name.clone(),
            content_type: content_type.to_string(),
            kind,
            bytes,
        };

        pool.lock().await.uploads.insert(name, upload.clone());
        upload
    }

    pub async fn get_upload(pool: &DbPool, name: &str) -> Option<StoredUpload> {
        pool.lock().await.uploads.get(name).cloned()
    }
}

/// Data models for the in-memory store.
/// Represents users, room messages and uploaded media, plus request/response DTOs.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
}

impl MessageKind {
    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

/// A message as stored and as sent to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Room the message was posted to
    pub room: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

/// A message as submitted by a client over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "fileUrl", default)]
    pub file_url: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
}

impl Envelope {
    /// Text needs non-blank content, media needs a file URL
    pub fn validate(&self) -> Result<(), String> {
        if self.sender_id.is_empty() {
            return Err("senderId is required".to_string());
        }
        match self.kind {
            MessageKind::Text => match self.content.as_deref() {
                Some(text) if !text.trim().is_empty() => Ok(()),
                _ => Err("text message requires content".to_string()),
            },
            MessageKind::Image | MessageKind::Video => match self.file_url.as_deref() {
                Some(url) if !url.is_empty() => Ok(()),
                _ => Err("media message requires fileUrl".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub name: String,
    pub content_type: String,
    pub kind: MessageKind,
    pub bytes: Vec<u8>,
}

// Request/Response DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub room: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

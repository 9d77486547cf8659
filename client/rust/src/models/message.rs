/// Message model for the room chat client.
/// Field names follow the server's JSON (`type`, `fileUrl`, `senderId`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::User;

/// Server-assigned message identifier.
/// The server may encode it as a JSON string or number; both normalize to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::string_or_number(deserializer).map(MessageId)
    }
}

/// What a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
}

impl MessageKind {
    pub fn is_media(self) -> bool {
        !matches!(self, MessageKind::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as broadcast by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Room the server posted the message to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "fileUrl", default)]
    pub media_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// The id when the server assigned a non-empty one
    pub fn known_id(&self) -> Option<&MessageId> {
        self.id.as_ref().filter(|id| !id.is_empty())
    }

    /// Exactly one of content/media_url is set, matching `kind`
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            MessageKind::Text => self.content.is_some() && self.media_url.is_none(),
            MessageKind::Image | MessageKind::Video => {
                self.media_url.is_some() && self.content.is_none()
            }
        }
    }

    pub fn is_from(&self, user: &User) -> bool {
        self.sender_id == user.id
    }

    /// False only when the message names a different room
    pub fn belongs_to(&self, room: &str) -> bool {
        self.room.as_deref().map_or(true, |own| own == room)
    }
}

/// Outbound payload before the server assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "fileUrl")]
    pub media_url: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
}

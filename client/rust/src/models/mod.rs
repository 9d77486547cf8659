/// Data models for the room chat client.
/// Defines messages, users, and the websocket frames exchanged with the server.

pub mod message;
pub mod user;

pub use message::{Envelope, Message, MessageId, MessageKind};
pub use user::User;

use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as JSON strings or numbers; both normalize to a string
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
    })
}

/// Inbound event carrying a broadcast message
pub const RECEIVE_MESSAGE: &str = "receive_message";

/// Outbound frames on the live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinRoom(String),
    SendMessage(Envelope),
}

impl ClientFrame {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientFrame::JoinRoom(_) => "join_room",
            ClientFrame::SendMessage(_) => "send_message",
        }
    }
}

/// Inbound frame; `data` is decoded by whichever handler owns `event`
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Command types for the terminal front end
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Message(String),
    Upload {
        path: String,
        declared_type: Option<String>,
    },
    Quit,
}

impl Command {
    /// Parse a line of user input
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();

        if trimmed == "/quit" || trimmed == "/exit" {
            return Ok(Command::Quit);
        }

        if let Some(rest) = trimmed.strip_prefix("/upload") {
            let mut parts = rest.split_whitespace();
            let path = parts
                .next()
                .ok_or_else(|| "Usage: /upload <path> [image|video]".to_string())?;
            let declared_type = parts.next().map(str::to_string);
            return Ok(Command::Upload {
                path: path.to_string(),
                declared_type,
            });
        }

        if trimmed.starts_with('/') {
            return Err(format!("Unknown command: {}", trimmed));
        }

        Ok(Command::Message(input.to_string()))
    }
}

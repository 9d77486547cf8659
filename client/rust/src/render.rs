//! Render adapter: turns the ordered message list into display rows.
//!
//! Media URLs from the server are relative (`/uploads/...`) and get the server
//! base prepended here. Rows are keyed by message id, falling back to the
//! position for messages the server sent without one.

use crate::models::{Message, MessageKind, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody {
    Text(String),
    Image(String),
    Video(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub key: String,
    pub is_mine: bool,
    /// Shown for other people's messages only
    pub sender_label: Option<String>,
    pub body: DisplayBody,
}

pub struct RenderAdapter {
    viewer: User,
    media_base: String,
}

impl RenderAdapter {
    pub fn new(viewer: User, media_base: &str) -> Self {
        RenderAdapter {
            viewer,
            media_base: media_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn render(&self, messages: &[Message]) -> Vec<DisplayMessage> {
        messages
            .iter()
            .enumerate()
            .map(|(index, message)| self.render_one(index, message))
            .collect()
    }

    fn render_one(&self, index: usize, message: &Message) -> DisplayMessage {
        let is_mine = message.is_from(&self.viewer);
        let key = message
            .known_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("pos-{}", index));

        let body = match message.kind {
            MessageKind::Text => DisplayBody::Text(message.content.clone().unwrap_or_default()),
            MessageKind::Image => DisplayBody::Image(self.media_url(message)),
            MessageKind::Video => DisplayBody::Video(self.media_url(message)),
        };

        DisplayMessage {
            key,
            is_mine,
            sender_label: (!is_mine).then(|| message.sender_name.clone()),
            body,
        }
    }

    fn media_url(&self, message: &Message) -> String {
        match message.media_url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
            Some(url) => format!("{}{}", self.media_base, url),
            None => String::new(),
        }
    }
}

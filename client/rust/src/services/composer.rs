/// Outgoing message composer.
/// Builds envelopes for the logged-in user and hands them to the transport.

use crate::error::{ClientError, Result};
use crate::models::{Envelope, MessageKind, User};
use crate::services::upload_service::UploadResult;
use crate::services::WebSocketManager;

pub struct MessageComposer {
    user: User,
    transport: WebSocketManager,
}

impl MessageComposer {
    pub fn new(user: User, transport: WebSocketManager) -> Self {
        MessageComposer { user, transport }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// `None` for blank input
    pub fn compose_text(&self, text: &str) -> Option<Envelope> {
        if text.trim().is_empty() {
            return None;
        }

        Some(Envelope {
            content: Some(text.to_string()),
            kind: MessageKind::Text,
            media_url: None,
            sender_id: self.user.id.clone(),
            sender_name: self.user.username.clone(),
        })
    }

    pub fn compose_media(&self, upload: &UploadResult) -> Envelope {
        Envelope {
            content: None,
            kind: upload.kind,
            media_url: Some(upload.resource_url.clone()),
            sender_id: self.user.id.clone(),
            sender_name: self.user.username.clone(),
        }
    }

    /// Compose and send text. Blank input yields `EmptySubmission` and sends nothing.
    pub async fn submit_text(&self, text: &str) -> Result<()> {
        let envelope = self.compose_text(text).ok_or(ClientError::EmptySubmission)?;
        self.transport.send(envelope).await
    }

    pub async fn submit_media(&self, upload: &UploadResult) -> Result<()> {
        self.transport.send(self.compose_media(upload)).await
    }
}

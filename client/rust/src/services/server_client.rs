/// Server communication layer for the request/response endpoints.
/// Login, history fetch and media upload; the live channel lives in `websocket_manager`.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{Message, MessageKind, User};
use reqwest::{multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Upload endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

pub struct ServerClient {
    base_url: String,
    client: Client,
}

impl ServerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(ServerClient {
            base_url: config.api_url(),
            client,
        })
    }

    /// Log in, registering the user on first use
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user = response.json::<User>().await?;
                log::info!("Logged in as {} ({})", user.username, user.id);
                Ok(user)
            }
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => {
                let reason = Self::error_reason(response)
                    .await
                    .unwrap_or_else(|| "Login failed".to_string());
                Err(ClientError::Auth(reason))
            }
            status => Err(ClientError::Server(format!("Login failed: {}", status))),
        }
    }

    /// Fetch the room backlog in server order
    pub async fn fetch_history(&self, room: &str) -> Result<Vec<Message>> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("room", room)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Server(format!(
                "Failed to fetch messages: {}",
                response.status()
            )));
        }

        let messages = response.json::<Vec<Message>>().await?;
        log::debug!("Fetched {} historical messages for {}", messages.len(), room);
        Ok(messages)
    }

    /// Send one file as a multipart body (`file` field)
    pub async fn upload_file(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        let url = format!("{}/upload", self.base_url);

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = Self::error_reason(response)
                .await
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Server(format!("Upload rejected: {}", reason)));
        }

        Ok(response.json::<UploadResponse>().await?)
    }

    /// Check if the server is healthy
    pub async fn health_check(&self) -> Result<()> {
        let root = self.base_url.trim_end_matches("/api");
        let response = self.client.get(format!("{}/health", root)).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Server(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    async fn error_reason(response: reqwest::Response) -> Option<String> {
        response.json::<ErrorBody>().await.ok().map(|body| body.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_client_creation() {
        let client = ServerClient::new(&ClientConfig::new("http://localhost:4000")).unwrap();
        assert_eq!(client.base_url, "http://localhost:4000/api");
    }

    #[test]
    fn test_upload_response_parsing() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"url":"/uploads/abc.mp4","type":"video"}"#).unwrap();
        assert_eq!(response.url, "/uploads/abc.mp4");
        assert_eq!(response.kind, MessageKind::Video);
    }
}

/// Service layer for the room chat client.
/// Transport, history/upload endpoints, message store and composition.

pub mod chat_session;
pub mod composer;
pub mod message_store;
pub mod server_client;
pub mod upload_service;
pub mod websocket_manager;

pub use chat_session::ChatSession;
pub use composer::MessageComposer;
pub use message_store::{MessageStore, RoomEpoch};
pub use server_client::ServerClient;
pub use upload_service::{MediaAsset, UploadJob, UploadResult, UploadService, UploadStatus};
pub use websocket_manager::{ConnectionState, WebSocketManager};

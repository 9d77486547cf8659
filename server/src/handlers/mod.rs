/// HTTP handlers module
/// Provides REST and WebSocket endpoints

pub mod rest;
pub mod websocket;

pub use rest::{get_messages, get_upload, health, login, upload};
pub use websocket::{ws_connect, Outbound, WsServer};

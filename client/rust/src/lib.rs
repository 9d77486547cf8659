/// Room Chat Client Library
/// Realtime room messaging: live websocket sync, history merge, and media upload

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod services;

pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{ClientError, Result};
pub use services::ChatSession;

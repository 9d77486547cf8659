/// Room chat reference server: login, per-room history, media uploads and a
/// room-scoped WebSocket relay, all held in memory.
pub mod config;
pub mod db;
pub mod handlers;
pub mod server;

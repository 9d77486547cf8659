/// Room Chat Server
///
/// Main server entry point. Handles:
/// - Command-line argument parsing
/// - In-memory store setup
/// - HTTP and WebSocket server startup
use actix_web::web;
use room_chat_server::config::Config;
use room_chat_server::handlers::WsServer;
use room_chat_server::{db, server};
use std::fs;
use std::process;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = Config::from_args();

    log::info!("Starting Room Chat Server");
    log::info!("Port: {}", config.port);

    if let Some(pidfile) = &config.pidfile {
        let pid = process::id().to_string();
        fs::write(pidfile, pid)?;
        log::info!("PID file written to: {:?}", pidfile);
    }

    let pool = web::Data::new(db::create_pool());
    let ws_server = web::Data::new(WsServer::new(pool.clone()));

    let bind_addr = config.bind_addr();
    log::info!("Starting HTTP server on {}", bind_addr);

    let http_server = server::create_http_server(pool, ws_server, &bind_addr)?;
    http_server.await
}

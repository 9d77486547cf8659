/// HTTP server factory and configuration.
/// Provides a reusable function to create and configure the HTTP server
/// for use in both the main binary and tests.

use crate::db::DbPool;
use crate::handlers::{get_messages, get_upload, health, login, upload, ws_connect, WsServer};
use actix_web::{middleware, web, App, HttpServer};

/// Register every route on an app
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // REST endpoints
        .route("/health", web::get().to(health))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/messages", web::get().to(get_messages))
        .route("/api/upload", web::post().to(upload))
        .route("/uploads/{name}", web::get().to(get_upload))
        // WebSocket endpoint
        .route("/ws", web::get().to(ws_connect));
}

/// Create a configured HTTP server
///
/// # Arguments
/// * `pool` - In-memory store wrapped in web::Data
/// * `ws_server` - WebSocket server instance wrapped in web::Data
/// * `bind_addr` - Address to bind the server to (e.g., "127.0.0.1:3001")
///
/// # Example
/// ```ignore
/// let pool = web::Data::new(db::create_pool());
/// let ws_server = web::Data::new(WsServer::new(pool.clone()));
/// let server = server::create_http_server(pool, ws_server, "127.0.0.1:3001")?;
/// server.await?;
/// ```
pub fn create_http_server(
    pool: web::Data<DbPool>,
    ws_server: web::Data<WsServer>,
    bind_addr: &str,
) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(ws_server.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

/// Create a test HTTP server with a fresh store, bound to a random port
///
/// # Returns
/// A tuple of (server, bind_address) where bind_address can be used to make requests
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_http_server() -> std::io::Result<(actix_web::dev::Server, String)> {
    let pool = web::Data::new(crate::db::create_test_pool());
    let ws_server = web::Data::new(WsServer::new(pool.clone()));
    create_test_http_server_with(pool, ws_server)
}

/// Like [`create_test_http_server`], with caller-owned state so tests can
/// inspect the store or drop connections through the `WsServer`
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_http_server_with(
    pool: web::Data<DbPool>,
    ws_server: web::Data<WsServer>,
) -> std::io::Result<(actix_web::dev::Server, String)> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(ws_server.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .workers(1)
    .bind("127.0.0.1:0")?;

    // Get the actual bind address (including the assigned port)
    let addr_str = server
        .addrs()
        .first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "No bind address found"))?
        .to_string();

    Ok((server.run(), addr_str))
}

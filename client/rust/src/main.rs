/// Room Chat Client - Main entry point
///
/// A command-line client for a realtime chat room
use clap::Parser;
use log::info;
use room_chat_client::{cli, ChatSession, ClientConfig, Result};

#[derive(Parser)]
#[command(name = "room-chat")]
#[command(about = "Room Chat Client - realtime room messaging")]
struct Args {
    /// Server URL (default: http://localhost:3001)
    #[arg(long, default_value = room_chat_client::config::DEFAULT_SERVER_URL)]
    server: String,

    /// Room to join
    #[arg(long, default_value = room_chat_client::config::DEFAULT_ROOM)]
    room: String,

    /// Password; the first login registers the user
    #[arg(long, default_value = "")]
    password: String,

    /// Give up reconnecting after this many attempts
    #[arg(long, default_value_t = 12)]
    max_reconnect_attempts: u32,

    /// Username for this client
    username: String,

    /// Enable verbose logging (DEBUG level)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    info!("Starting Room Chat Client");
    info!("Server: {}", args.server);
    info!("Room: {}", args.room);
    info!("Username: {}", args.username);

    let mut config = ClientConfig::new(args.server).with_room(args.room);
    config.reconnect.max_attempts = args.max_reconnect_attempts;

    let session = ChatSession::login(config, &args.username, &args.password).await?;

    cli::run_client_loop(&session).await?;

    Ok(())
}

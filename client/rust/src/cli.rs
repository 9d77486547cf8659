//! CLI interface for the room chat client
//!
//! Provides command parsing, display formatting, and the interactive loop that
//! multiplexes stdin with store and connection updates.

use crate::error::{ClientError, Result};
use crate::models::Command;
use crate::render::{DisplayBody, DisplayMessage, RenderAdapter};
use crate::services::{ChatSession, ConnectionState, MediaAsset};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Parse a command from user input
pub fn parse_command(input: &str) -> std::result::Result<Command, String> {
    Command::parse(input)
}

/// Format a message for display
pub fn format_message(room: &str, sender: &str, text: &str) -> String {
    format!("#{} <{}> {}", room, sender, text)
}

/// Format a control message for display
pub fn format_control(room: &str, action: &str) -> String {
    format!("#{} {}", room, action)
}

/// Format one rendered row; own messages are labelled with `me`
pub fn format_display(room: &str, me: &str, row: &DisplayMessage) -> String {
    let sender = row.sender_label.as_deref().unwrap_or(me);
    let text = match &row.body {
        DisplayBody::Text(text) => text.clone(),
        DisplayBody::Image(url) => format!("[image] {}", url),
        DisplayBody::Video(url) => format!("[video] {}", url),
    };
    format_message(room, sender, &text)
}

fn describe_state(state: &ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting...",
        ConnectionState::Connected { .. } => "connected",
        ConnectionState::Reconnecting { .. } => "connection lost, reconnecting...",
    }
}

/// Show an error in the room view, or only log it if the user need not see it
fn report_error(room: &str, error: &ClientError) {
    if error.is_user_visible() {
        println!("{}", format_control(room, &error.to_string()));
    } else {
        log::debug!("Not shown: {}", error);
    }
}

/// Async stdin reader that yields one line at a time
///
/// # Returns
/// - `Ok(Some(line))` - User entered a line
/// - `Ok(None)` - EOF reached (Ctrl+D)
/// - `Err(e)` - I/O error
pub async fn read_line_async(reader: &mut BufReader<tokio::io::Stdin>) -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None),
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Some(line))
        }
        Err(e) => Err(e.into()),
    }
}

/// Forward stdin lines into a channel so the main loop can select on them
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin());
        loop {
            match read_line_async(&mut reader).await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Run the interactive loop until `/quit` or EOF, then log out
pub async fn run_client_loop(session: &ChatSession) -> Result<()> {
    let room = session.config().room.clone();
    let me = session.user().username.clone();
    let adapter = RenderAdapter::new(session.user().clone(), session.config().base_url());

    let mut messages = session.watch_messages();
    let mut connection = session.watch_connection();
    let mut lines = spawn_stdin_reader();

    println!("{}", format_control(&room, &format!("joined as {}", me)));
    println!("Commands: /upload <path> [image|video], /quit");

    let rows = adapter.render(&messages.borrow_and_update());
    for row in &rows {
        println!("{}", format_display(&room, &me, row));
    }
    let mut printed = rows.len();

    loop {
        tokio::select! {
            changed = messages.changed() => {
                if changed.is_err() {
                    break;
                }
                let rows = adapter.render(&messages.borrow_and_update());
                if rows.len() < printed {
                    printed = 0;
                }
                for row in rows.iter().skip(printed) {
                    println!("{}", format_display(&room, &me, row));
                }
                printed = rows.len();
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = connection.borrow_and_update().clone();
                println!("{}", format_control(&room, describe_state(&state)));
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(Command::Message(text)) => {
                        if let Err(e) = session.submit_text(&text).await {
                            report_error(&room, &e);
                        }
                    }
                    Ok(Command::Upload { path, declared_type }) => {
                        let mut asset = MediaAsset::new(path);
                        asset.declared_type = declared_type;
                        match session.submit_asset(&asset).await {
                            Ok(upload) => log::debug!("Sent {} {}", upload.kind, upload.resource_url),
                            Err(e) => report_error(&room, &e),
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    session.logout().await;
    println!("Goodbye!");
    Ok(())
}

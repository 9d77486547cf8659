/// REST API handlers for HTTP endpoints.
/// Handles login, room history, media upload and upload retrieval.

use crate::db::{models::*, Database, DbError, DbPool};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result as ActixResult};
use futures::{StreamExt, TryStreamExt};
use serde_json::json;

pub const DEFAULT_ROOM: &str = "general";
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Health check endpoint
pub async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}

/// Log in, registering the username on first use
/// POST /api/auth/login
pub async fn login(
    pool: web::Data<DbPool>,
    req: web::Json<LoginRequest>,
) -> ActixResult<HttpResponse> {
    match Database::login(&pool, &req.username, &req.password).await {
        Ok(user) => Ok(HttpResponse::Ok().json(UserResponse {
            id: user.id,
            username: user.username,
        })),
        Err(DbError::InvalidCredentials) => {
            log::warn!("Rejected login for {}", req.username);
            Ok(HttpResponse::Unauthorized().json(json!({
                "error": "Invalid credentials"
            })))
        }
        Err(DbError::InvalidInput(reason)) => Ok(HttpResponse::BadRequest().json(json!({
            "error": reason
        }))),
    }
}

/// Room history, oldest first
/// GET /api/messages?room=<room>
pub async fn get_messages(
    pool: web::Data<DbPool>,
    query: web::Query<HistoryQuery>,
) -> ActixResult<HttpResponse> {
    let room = query.room.as_deref().unwrap_or(DEFAULT_ROOM);
    let messages = Database::get_room_messages(&pool, room).await;
    log::debug!("Serving {} messages for room {}", messages.len(), room);
    Ok(HttpResponse::Ok().json(messages))
}

/// Accept a multipart upload with a single `file` field
/// POST /api/upload
pub async fn upload(pool: web::Data<DbPool>, mut payload: Multipart) -> ActixResult<HttpResponse> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some("file") {
            // Drain fields we don't care about
            while field.next().await.is_some() {}
            continue;
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Ok(HttpResponse::PayloadTooLarge().json(json!({
                    "error": "File too large"
                })));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "Empty file"
            })));
        }

        let kind = determine_kind(&content_type, file_name.as_deref());
        let extension = file_extension(file_name.as_deref(), &content_type);
        let stored =
            Database::store_upload(&pool, extension.as_deref(), &content_type, kind, bytes).await;

        log::info!(
            "Stored upload {} ({}, {} bytes)",
            stored.name,
            stored.content_type,
            stored.bytes.len()
        );

        return Ok(HttpResponse::Ok().json(UploadResponse {
            url: format!("/uploads/{}", stored.name),
            kind: stored.kind,
        }));
    }

    Ok(HttpResponse::BadRequest().json(json!({
        "error": "No file provided"
    })))
}

/// Serve a previously uploaded file
/// GET /uploads/:name
pub async fn get_upload(
    pool: web::Data<DbPool>,
    name: web::Path<String>,
) -> ActixResult<HttpResponse> {
    match Database::get_upload(&pool, &name).await {
        Some(upload) => Ok(HttpResponse::Ok()
            .content_type(upload.content_type)
            .body(upload.bytes)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "error": "Upload not found"
        }))),
    }
}

/// Video when the content type or extension says so, image otherwise
pub fn determine_kind(content_type: &str, file_name: Option<&str>) -> MessageKind {
    if content_type.starts_with("video/") {
        return MessageKind::Video;
    }
    if content_type.starts_with("image/") {
        return MessageKind::Image;
    }

    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v") => MessageKind::Video,
        _ => MessageKind::Image,
    }
}

fn file_extension(file_name: Option<&str>, content_type: &str) -> Option<String> {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.or_else(|| {
        content_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .filter(|subtype| !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|subtype| match subtype {
                "jpeg" => "jpg".to_string(),
                "quicktime" => "mov".to_string(),
                other => other.to_string(),
            })
    })
}

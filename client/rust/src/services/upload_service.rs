/// Media upload pipeline.
/// Turns a locally picked asset into a durable resource URL over HTTP, independent
/// of the live channel. A message is only composed after an upload succeeded.

use crate::error::{ClientError, Result};
use crate::models::MessageKind;
use crate::services::ServerClient;
use std::path::PathBuf;
use std::sync::Arc;

const GENERIC_IMAGE_MIME: &str = "image/jpeg";
const GENERIC_VIDEO_MIME: &str = "video/mp4";

/// A locally picked file plus the type the picker reported, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub uri: String,
    pub declared_type: Option<String>,
}

impl MediaAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        MediaAsset {
            uri: uri.into(),
            declared_type: None,
        }
    }

    pub fn with_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    /// Last path segment of the URI
    pub fn file_name(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }

    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
    }
}

/// MIME type sent with the upload and the message kind it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeCategory {
    pub kind: MessageKind,
    pub mime: String,
}

impl MimeCategory {
    fn new(kind: MessageKind, mime: &str) -> Self {
        MimeCategory {
            kind,
            mime: mime.to_string(),
        }
    }
}

/// Declared type first, then the file extension, then a generic image
pub fn infer_mime(asset: &MediaAsset) -> MimeCategory {
    asset
        .declared_type
        .as_deref()
        .and_then(from_declared_type)
        .or_else(|| from_extension(asset.file_name()))
        .unwrap_or_else(|| MimeCategory::new(MessageKind::Image, GENERIC_IMAGE_MIME))
}

fn from_declared_type(declared: &str) -> Option<MimeCategory> {
    let declared = declared.trim().to_lowercase();
    match declared.as_str() {
        "video" => Some(MimeCategory::new(MessageKind::Video, GENERIC_VIDEO_MIME)),
        "image" => Some(MimeCategory::new(MessageKind::Image, GENERIC_IMAGE_MIME)),
        full if full.starts_with("video/") => Some(MimeCategory::new(MessageKind::Video, full)),
        full if full.starts_with("image/") => Some(MimeCategory::new(MessageKind::Image, full)),
        _ => None,
    }
}

fn from_extension(file_name: &str) -> Option<MimeCategory> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let category = match ext.to_lowercase().as_str() {
        "png" => MimeCategory::new(MessageKind::Image, "image/png"),
        "jpg" | "jpeg" => MimeCategory::new(MessageKind::Image, "image/jpeg"),
        "gif" => MimeCategory::new(MessageKind::Image, "image/gif"),
        "webp" => MimeCategory::new(MessageKind::Image, "image/webp"),
        "heic" => MimeCategory::new(MessageKind::Image, "image/heic"),
        "bmp" => MimeCategory::new(MessageKind::Image, "image/bmp"),
        "mp4" => MimeCategory::new(MessageKind::Video, "video/mp4"),
        "mov" => MimeCategory::new(MessageKind::Video, "video/quicktime"),
        "m4v" => MimeCategory::new(MessageKind::Video, "video/x-m4v"),
        "webm" => MimeCategory::new(MessageKind::Video, "video/webm"),
        "mkv" => MimeCategory::new(MessageKind::Video, "video/x-matroska"),
        "avi" => MimeCategory::new(MessageKind::Video, "video/x-msvideo"),
        "3gp" => MimeCategory::new(MessageKind::Video, "video/3gpp"),
        _ => return None,
    };
    Some(category)
}

/// A stored media resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub resource_url: String,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Succeeded(UploadResult),
    Failed(String),
}

/// One upload attempt; not persisted
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub asset: MediaAsset,
    pub mime: MimeCategory,
    pub status: UploadStatus,
}

impl UploadJob {
    pub fn new(asset: MediaAsset) -> Self {
        let mime = infer_mime(&asset);
        UploadJob {
            asset,
            mime,
            status: UploadStatus::Pending,
        }
    }

    pub fn into_result(self) -> Result<UploadResult> {
        match self.status {
            UploadStatus::Succeeded(result) => Ok(result),
            UploadStatus::Failed(reason) => Err(ClientError::UploadFailed(reason)),
            UploadStatus::Pending => Err(ClientError::State("Upload has not run".to_string())),
        }
    }
}

pub struct UploadService {
    server_client: Arc<ServerClient>,
}

impl UploadService {
    pub fn new(server_client: Arc<ServerClient>) -> Self {
        UploadService { server_client }
    }

    /// Upload an asset; any failure comes back as `UploadFailed`
    pub async fn upload(&self, asset: &MediaAsset) -> Result<UploadResult> {
        let mut job = UploadJob::new(asset.clone());
        self.run(&mut job).await;
        job.into_result()
    }

    /// Drive a job from `Pending` to `Succeeded` or `Failed`
    pub async fn run(&self, job: &mut UploadJob) {
        job.status = match self.transfer(job).await {
            Ok(result) => {
                log::info!("Uploaded {} to {}", job.asset.uri, result.resource_url);
                UploadStatus::Succeeded(result)
            }
            Err(e) => {
                log::error!("Upload of {} failed: {}", job.asset.uri, e);
                UploadStatus::Failed(e.to_string())
            }
        };
    }

    async fn transfer(&self, job: &UploadJob) -> Result<UploadResult> {
        let bytes = tokio::fs::read(job.asset.local_path()).await?;
        log::debug!(
            "Uploading {} ({} bytes, {})",
            job.asset.file_name(),
            bytes.len(),
            job.mime.mime
        );

        let response = self
            .server_client
            .upload_file(job.asset.file_name(), &job.mime.mime, bytes)
            .await?;

        if !response.kind.is_media() {
            return Err(ClientError::Server(format!(
                "Upload returned non-media kind: {}",
                response.kind
            )));
        }

        Ok(UploadResult {
            resource_url: response.url,
            kind: response.kind,
        })
    }
}

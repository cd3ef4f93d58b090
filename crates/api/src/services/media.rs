//! Image hosting on Cloudinary.
//!
//! Uploads are signed with the account's API secret: the signed parameters
//! are sorted by name, joined as `k=v&k=v`, the secret is appended, and the
//! SHA-1 hex digest is sent as `signature`.

use std::sync::Arc;

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::config::MediaConfig;

/// Largest accepted upload.
pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Images are scaled down to fit 800x800 and recompressed.
const UPLOAD_TRANSFORMATION: &str = "c_limit,h_800,w_800/q_auto";

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Errors from validating or uploading images.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Uploads are not configured.
    #[error("image uploads are not configured")]
    Disabled,

    /// The file is not an image.
    #[error("only image files are allowed")]
    InvalidType,

    /// The file exceeds [`MAX_FILE_SIZE`].
    #[error("file is too large (max 25MB)")]
    TooLarge,

    /// More files than the endpoint accepts.
    #[error("too many files (max {0})")]
    TooManyFiles(usize),

    /// No file was sent.
    #[error("no image uploaded")]
    NoFiles,

    /// HTTP error talking to the CDN.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CDN rejected the request.
    #[error("CDN error: {0}")]
    Api(String),
}

/// An image file read from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Check the content type and size.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InvalidType` for non-image content and
    /// `MediaError::TooLarge` above [`MAX_FILE_SIZE`].
    pub fn validate(&self) -> Result<(), MediaError> {
        if !self.content_type.starts_with("image/") {
            return Err(MediaError::InvalidType);
        }
        if self.bytes.len() > MAX_FILE_SIZE {
            return Err(MediaError::TooLarge);
        }
        Ok(())
    }
}

/// Check the number of files sent to an endpoint.
///
/// # Errors
///
/// Returns `MediaError::NoFiles` or `MediaError::TooManyFiles`.
pub const fn check_file_count(count: usize, max: usize) -> Result<(), MediaError> {
    if count == 0 {
        return Err(MediaError::NoFiles);
    }
    if count > max {
        return Err(MediaError::TooManyFiles(max));
    }
    Ok(())
}

/// A hosted image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Cloudinary client. Cheap to clone.
#[derive(Clone)]
pub struct MediaService {
    inner: Option<Arc<MediaServiceInner>>,
}

struct MediaServiceInner {
    client: reqwest::Client,
    config: MediaConfig,
}

impl MediaService {
    #[must_use]
    pub fn new(config: Option<MediaConfig>) -> Self {
        Self {
            inner: config.map(|config| {
                Arc::new(MediaServiceInner {
                    client: reqwest::Client::new(),
                    config,
                })
            }),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Upload an image into the configured folder.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Disabled` when uploads are not configured, a
    /// validation error for bad files, or the CDN's error.
    pub async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, MediaError> {
        let inner = self.inner.as_ref().ok_or(MediaError::Disabled)?;
        image.validate()?;

        let config = &inner.config;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("folder", &config.folder),
                ("timestamp", &timestamp),
                ("transformation", UPLOAD_TRANSFORMATION),
            ],
            config.api_secret.expose_secret(),
        );

        let file = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", config.folder.clone())
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("signature", signature);

        let response = inner
            .client
            .post(format!("{API_BASE}/{}/image/upload", config.cloud_name))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: UploadResponse = response.json().await?;
        tracing::info!(public_id = %body.public_id, "Image uploaded");

        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
            width: body.width,
            height: body.height,
        })
    }

    /// Delete a hosted image.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Disabled` when not configured, or the CDN's error.
    pub async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let inner = self.inner.as_ref().ok_or(MediaError::Disabled)?;
        let config = &inner.config;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            config.api_secret.expose_secret(),
        );

        let response = inner
            .client
            .post(format!("{API_BASE}/{}/image/destroy", config.cloud_name))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        tracing::info!(public_id = %public_id, "Image destroyed");
        Ok(())
    }
}

async fn api_error(response: reqwest::Response) -> MediaError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));
    MediaError::Api(message)
}

/// Sign request parameters with the API secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(key, _)| *key);

    let payload = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

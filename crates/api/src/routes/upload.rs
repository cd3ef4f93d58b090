//! Multipart form reading for image uploads.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::Result;
use crate::services::media::{self, ImageUpload};

/// Images and text fields from a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub images: Vec<ImageUpload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read a multipart body, collecting files sent as `file_field`.
    ///
    /// Every file is validated as it is read, and the count must be between
    /// one and `max_files`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Media` for bad files or counts and
    /// `AppError::BadRequest` for malformed bodies.
    pub async fn read(mut multipart: Multipart, file_field: &str, max_files: usize) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == file_field && field.file_name().is_some() {
                let image = ImageUpload {
                    file_name: field.file_name().unwrap_or("upload").to_owned(),
                    content_type: field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned(),
                    bytes: field.bytes().await?.to_vec(),
                };
                image.validate()?;
                form.images.push(image);
                media::check_file_count(form.images.len(), max_files)?;
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        media::check_file_count(form.images.len(), max_files)?;
        Ok(form)
    }

    /// A trimmed text field, or the empty string.
    #[must_use]
    pub fn field(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.trim().to_owned())
            .unwrap_or_default()
    }

    /// The first image.
    ///
    /// `read` guarantees at least one.
    #[must_use]
    pub fn into_first_image(self) -> Option<ImageUpload> {
        self.images.into_iter().next()
    }
}

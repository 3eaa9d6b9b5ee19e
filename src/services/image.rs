//! Image host client
//!
//! Unsigned form-post uploads; the host returns a public `secure_url`.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::settings::ImageHostConfig;
use crate::utils::errors::{ClubError, Result};
use crate::utils::logging::log_api_error;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Clone)]
pub struct ImageHostClient {
    client: Client,
    upload_url: String,
    upload_preset: String,
    max_bytes: usize,
}

impl ImageHostClient {
    pub fn new(config: &ImageHostConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            upload_preset: config.upload_preset.clone(),
            max_bytes: config.max_bytes,
        })
    }

    pub async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(ClubError::Validation("Image file is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(ClubError::Validation(format!(
                "Image is {} bytes, the limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let size = bytes.len();
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                log_api_error("image_host", &e.to_string(), Some(filename));
                ClubError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_api_error("image_host", &status.to_string(), Some(&body));
            return Err(ClubError::ServiceUnavailable(format!(
                "Image upload failed with status {}",
                status
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        info!(filename, size, url = %uploaded.secure_url, "Image uploaded");
        Ok(uploaded.secure_url)
    }
}

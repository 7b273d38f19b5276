//! Cloudinary signed uploads.
//!
//! Uploads go to `{api_base}/{cloud_name}/auto/upload` as multipart forms. The
//! signature is the SHA-256 hex digest of the alphabetically sorted signed
//! parameters (`key=value` joined by `&`) followed by the API secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{MediaError, MediaUploader, TransformationPreset, UploadFile, UploadedAsset};
use crate::config::AppConfig;

const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Clone)]
pub struct CloudinaryUploader {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

impl CloudinaryUploader {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Returns `None` unless cloud name, key and secret are all configured.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Option<Self> {
        Some(Self::new(
            client,
            config.cloudinary_api_base.clone(),
            config.cloudinary_cloud_name.clone()?,
            config.cloudinary_api_key.clone()?,
            config.cloudinary_api_secret.clone()?,
        ))
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/auto/upload", self.api_base, self.cloud_name)
    }

    /// Signs the given parameters with the API secret.
    pub fn sign(params: &BTreeMap<&'static str, String>, api_secret: &str) -> String {
        let to_sign = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn truncate(body: String) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        body
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(
        &self,
        file: UploadFile,
        folder: &str,
        preset: &TransformationPreset,
    ) -> Result<UploadedAsset, MediaError> {
        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        params.insert("transformation", preset.to_transformation_string());
        let signature = Self::sign(&params, &self.api_secret);

        let length = file.bytes.len() as u64;
        let part = Part::stream_with_length(file.bytes, length).file_name(file.file_name);

        let form = params
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", part);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Provider {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        let body: UploadResponse = response.json().await?;
        let secure_url = body.secure_url.ok_or(MediaError::MissingSecureUrl)?;

        Ok(UploadedAsset {
            secure_url,
            public_id: body.public_id,
        })
    }
}

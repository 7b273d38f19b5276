//! Card media: transformation presets and delegated uploads.
//!
//! All image work (resizing, cropping, format negotiation) is done by the
//! external provider. This module only picks the preset for an asset kind,
//! builds the destination folder (`{root}/{card_id}/{kind}`) and fans gallery
//! uploads out concurrently.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AppConfig;

pub mod cloudinary;

pub use cloudinary::CloudinaryUploader;

/// Maximum number of gallery files processed per request; extras are dropped.
pub const GALLERY_MAX_FILES: usize = 15;

/// The kind of card asset being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Avatar,
    Background,
    Logo,
    Gallery,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatar",
            MediaKind::Background => "background",
            MediaKind::Logo => "logo",
            MediaKind::Gallery => "gallery",
        }
    }

    /// Maps a multipart field name to a media kind.
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "avatar" => Some(MediaKind::Avatar),
            "background" => Some(MediaKind::Background),
            "logo" => Some(MediaKind::Logo),
            "gallery" | "gallery[]" => Some(MediaKind::Gallery),
            _ => None,
        }
    }

    pub fn preset(&self) -> TransformationPreset {
        match self {
            MediaKind::Avatar => TransformationPreset {
                width: Some(400),
                height: Some(400),
                crop: Crop::Fill,
                gravity: Some("face"),
            },
            MediaKind::Background => TransformationPreset {
                width: Some(1920),
                height: Some(1080),
                crop: Crop::Fill,
                gravity: None,
            },
            MediaKind::Logo => TransformationPreset {
                width: Some(500),
                height: Some(500),
                crop: Crop::Fit,
                gravity: None,
            },
            MediaKind::Gallery => TransformationPreset {
                width: Some(1200),
                height: None,
                crop: Crop::Limit,
                gravity: None,
            },
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crop {
    Fill,
    Fit,
    Limit,
}

impl Crop {
    fn as_str(&self) -> &'static str {
        match self {
            Crop::Fill => "fill",
            Crop::Fit => "fit",
            Crop::Limit => "limit",
        }
    }
}

/// Resize parameters applied by the provider. Quality and format are always
/// negotiated automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationPreset {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Crop,
    pub gravity: Option<&'static str>,
}

impl TransformationPreset {
    /// Renders the preset in the provider's transformation syntax,
    /// e.g. `w_400,h_400,c_fill,g_face,q_auto,f_auto`.
    pub fn to_transformation_string(&self) -> String {
        let mut parts = Vec::with_capacity(6);
        if let Some(width) = self.width {
            parts.push(format!("w_{width}"));
        }
        if let Some(height) = self.height {
            parts.push(format!("h_{height}"));
        }
        parts.push(format!("c_{}", self.crop.as_str()));
        if let Some(gravity) = self.gravity {
            parts.push(format!("g_{gravity}"));
        }
        parts.push("q_auto".to_string());
        parts.push("f_auto".to_string());
        parts.join(",")
    }
}

/// A file received from a client, held in memory until uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub secure_url: String,
    pub public_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media uploads are not configured")]
    NotConfigured,
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("media provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("media provider response did not include a secure_url")]
    MissingSecureUrl,
}

/// Uploads a single file into a folder with the given preset.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(
        &self,
        file: UploadFile,
        folder: &str,
        preset: &TransformationPreset,
    ) -> Result<UploadedAsset, MediaError>;
}

/// Used when no provider credentials are configured; every upload fails.
pub struct UnconfiguredUploader;

#[async_trait]
impl MediaUploader for UnconfiguredUploader {
    async fn upload(
        &self,
        _file: UploadFile,
        _folder: &str,
        _preset: &TransformationPreset,
    ) -> Result<UploadedAsset, MediaError> {
        Err(MediaError::NotConfigured)
    }
}

/// Files attached to a card create/update request.
#[derive(Debug, Clone, Default)]
pub struct CardUploads {
    pub avatar: Option<UploadFile>,
    pub background: Option<UploadFile>,
    pub logo: Option<UploadFile>,
    pub gallery: Vec<UploadFile>,
}

impl CardUploads {
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none()
            && self.background.is_none()
            && self.logo.is_none()
            && self.gallery.is_empty()
    }
}

/// URLs produced by [`MediaService::upload_card_media`]. `gallery` is `None`
/// when no gallery files were sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardMediaUrls {
    pub avatar: Option<String>,
    pub background: Option<String>,
    pub logo: Option<String>,
    pub gallery: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct MediaService {
    uploader: Arc<dyn MediaUploader>,
    root_folder: String,
}

impl MediaService {
    pub fn new(uploader: Arc<dyn MediaUploader>, root_folder: impl Into<String>) -> Self {
        Self {
            uploader,
            root_folder: root_folder.into(),
        }
    }

    /// Builds the service for the configured provider, falling back to
    /// [`UnconfiguredUploader`] when credentials are absent.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Self {
        let uploader: Arc<dyn MediaUploader> = match CloudinaryUploader::from_config(config, client)
        {
            Some(uploader) => Arc::new(uploader),
            None => {
                tracing::warn!("Cloudinary credentials not set; media uploads are disabled");
                Arc::new(UnconfiguredUploader)
            }
        };
        Self::new(uploader, config.media_root_folder.clone())
    }

    pub fn folder(&self, card_id: i32, kind: MediaKind) -> String {
        format!("{}/{}/{}", self.root_folder, card_id, kind)
    }

    pub async fn upload_single(
        &self,
        card_id: i32,
        kind: MediaKind,
        file: UploadFile,
    ) -> Result<String, MediaError> {
        let folder = self.folder(card_id, kind);
        let asset = self
            .uploader
            .upload(file, &folder, &kind.preset())
            .await?;
        tracing::debug!(card_id, kind = %kind, url = %asset.secure_url, "Uploaded card media");
        Ok(asset.secure_url)
    }

    /// Uploads up to [`GALLERY_MAX_FILES`] files concurrently, preserving input
    /// order. Fails as a whole if any single upload fails.
    pub async fn upload_gallery(
        &self,
        card_id: i32,
        mut files: Vec<UploadFile>,
    ) -> Result<Vec<String>, MediaError> {
        if files.len() > GALLERY_MAX_FILES {
            tracing::warn!(
                card_id,
                received = files.len(),
                max = GALLERY_MAX_FILES,
                "Dropping gallery files over the limit"
            );
            files.truncate(GALLERY_MAX_FILES);
        }

        try_join_all(
            files
                .into_iter()
                .map(|file| self.upload_single(card_id, MediaKind::Gallery, file)),
        )
        .await
    }

    /// Uploads every file of a card request concurrently.
    pub async fn upload_card_media(
        &self,
        card_id: i32,
        uploads: CardUploads,
    ) -> Result<CardMediaUrls, MediaError> {
        let CardUploads {
            avatar,
            background,
            logo,
            gallery,
        } = uploads;

        let single = |kind: MediaKind, file: Option<UploadFile>| async move {
            match file {
                Some(file) => self.upload_single(card_id, kind, file).await.map(Some),
                None => Ok(None),
            }
        };

        let gallery_upload = async {
            if gallery.is_empty() {
                Ok(None)
            } else {
                self.upload_gallery(card_id, gallery).await.map(Some)
            }
        };

        let (avatar, background, logo, gallery) = futures::try_join!(
            single(MediaKind::Avatar, avatar),
            single(MediaKind::Background, background),
            single(MediaKind::Logo, logo),
            gallery_upload,
        )?;

        Ok(CardMediaUrls {
            avatar,
            background,
            logo,
            gallery,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every upload and answers with a predictable URL.
    #[derive(Default)]
    pub struct RecordingUploader {
        pub calls: Mutex<Vec<(String, String, String)>>,
        pub fail_on: Option<String>,
    }

    #[async_trait]
    impl MediaUploader for RecordingUploader {
        async fn upload(
            &self,
            file: UploadFile,
            folder: &str,
            preset: &TransformationPreset,
        ) -> Result<UploadedAsset, MediaError> {
            if self.fail_on.as_deref() == Some(file.file_name.as_str()) {
                return Err(MediaError::Provider {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.calls.lock().unwrap().push((
                file.file_name.clone(),
                folder.to_string(),
                preset.to_transformation_string(),
            ));
            Ok(UploadedAsset {
                secure_url: format!("https://cdn.test/{}/{}", folder, file.file_name),
                public_id: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingUploader;
    use super::*;

    fn file(name: &str) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"fake-image-bytes"),
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            MediaKind::Avatar.preset().to_transformation_string(),
            "w_400,h_400,c_fill,g_face,q_auto,f_auto"
        );
        assert_eq!(
            MediaKind::Background.preset().to_transformation_string(),
            "w_1920,h_1080,c_fill,q_auto,f_auto"
        );
        assert_eq!(
            MediaKind::Logo.preset().to_transformation_string(),
            "w_500,h_500,c_fit,q_auto,f_auto"
        );
        assert_eq!(
            MediaKind::Gallery.preset().to_transformation_string(),
            "w_1200,c_limit,q_auto,f_auto"
        );
    }

    #[test]
    fn test_field_names() {
        assert_eq!(MediaKind::from_field("avatar"), Some(MediaKind::Avatar));
        assert_eq!(MediaKind::from_field("gallery[]"), Some(MediaKind::Gallery));
        assert_eq!(MediaKind::from_field("contacts"), None);
    }

    #[tokio::test]
    async fn test_folder_layout() {
        let uploader = Arc::new(RecordingUploader::default());
        let service = MediaService::new(uploader.clone(), "nfc_cards");

        let url = service
            .upload_single(42, MediaKind::Avatar, file("me.png"))
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.test/nfc_cards/42/avatar/me.png");
        let calls = uploader.calls.lock().unwrap();
        assert_eq!(calls[0].1, "nfc_cards/42/avatar");
        assert_eq!(calls[0].2, "w_400,h_400,c_fill,g_face,q_auto,f_auto");
    }

    #[tokio::test]
    async fn test_gallery_is_capped_at_fifteen() {
        let uploader = Arc::new(RecordingUploader::default());
        let service = MediaService::new(uploader.clone(), "nfc_cards");

        let files = (0..16).map(|i| file(&format!("{i}.jpg"))).collect();
        let urls = service.upload_gallery(7, files).await.unwrap();

        assert_eq!(urls.len(), GALLERY_MAX_FILES);
        assert_eq!(urls[0], "https://cdn.test/nfc_cards/7/gallery/0.jpg");
        assert_eq!(urls[14], "https://cdn.test/nfc_cards/7/gallery/14.jpg");

        let calls = uploader.calls.lock().unwrap();
        assert_eq!(calls.len(), GALLERY_MAX_FILES);
        assert!(calls.iter().all(|(name, _, _)| name != "15.jpg"));
    }

    #[tokio::test]
    async fn test_gallery_fails_as_a_whole() {
        let uploader = Arc::new(RecordingUploader {
            fail_on: Some("2.jpg".to_string()),
            ..Default::default()
        });
        let service = MediaService::new(uploader, "nfc_cards");

        let files = (0..4).map(|i| file(&format!("{i}.jpg"))).collect();
        let result = service.upload_gallery(7, files).await;

        assert!(matches!(result, Err(MediaError::Provider { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_upload_card_media_fills_only_sent_kinds() {
        let uploader = Arc::new(RecordingUploader::default());
        let service = MediaService::new(uploader, "nfc_cards");

        let urls = service
            .upload_card_media(
                3,
                CardUploads {
                    logo: Some(file("logo.png")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            urls,
            CardMediaUrls {
                logo: Some("https://cdn.test/nfc_cards/3/logo/logo.png".to_string()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_unconfigured_uploader() {
        let service = MediaService::new(Arc::new(UnconfiguredUploader), "nfc_cards");
        let result = service.upload_single(1, MediaKind::Logo, file("x.png")).await;
        assert!(matches!(result, Err(MediaError::NotConfigured)));
    }
}

//! Object storage for profile images and team logos.
//!
//! Talks to a storage REST endpoint (`/storage/v1/object/...`) with the
//! service key as bearer token.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub const PROFILE_BUCKET: &str = "profile-images";
pub const TEAM_LOGO_BUCKET: &str = "team-logos";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Clone)]
pub struct ObjectStorage {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

/// An uploaded image that passed validation.
#[derive(Debug)]
pub struct ImageUpload {
    pub content_type: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl ObjectStorage {
    /// `None` when storage isn't configured; image endpoints then answer 500.
    pub fn from_config(config: &Config) -> Option<Self> {
        let base_url = config.storage_url.as_deref()?;
        let service_key = config.storage_service_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            client,
        })
    }

    fn auth_headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| AppError::Internal(format!("invalid storage key: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Uploads `image` to `bucket/path` and returns its public URL.
    pub async fn upload(&self, bucket: &str, path: &str, image: ImageUpload) -> AppResult<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let content_type = HeaderValue::from_str(&image.content_type)
            .map_err(|e| AppError::bad_request(format!("invalid content type: {}", e)))?;

        let resp = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .header(CONTENT_TYPE, content_type)
            .body(image.bytes)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("storage upload failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "storage upload failed status={} body={}",
                status, body
            )));
        }

        tracing::info!("uploaded {}/{}", bucket, path);
        Ok(self.public_url(bucket, path))
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    /// Maps a public URL issued by this storage back to its object path.
    pub fn object_path(&self, bucket: &str, public_url: &str) -> Option<String> {
        let prefix = format!("{}/storage/v1/object/public/{}/", self.base_url, bucket);
        public_url
            .strip_prefix(&prefix)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }

    pub async fn remove(&self, bucket: &str, paths: &[String]) -> AppResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket);
        let resp = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("storage delete failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "storage delete failed status={}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Deletes a previously uploaded object. Failures are logged and ignored.
    pub async fn remove_quietly(&self, bucket: &str, public_url: Option<&str>) {
        let Some(path) = public_url.and_then(|url| self.object_path(bucket, url)) else {
            return;
        };
        if let Err(e) = self.remove(bucket, &[path.clone()]).await {
            tracing::warn!("failed to delete old object {}/{}: {}", bucket, path, e);
        }
    }
}

/// Checks type and size of an uploaded image and picks its file extension.
pub fn validate_image(
    content_type: Option<&str>,
    file_name: Option<&str>,
    bytes: Vec<u8>,
) -> AppResult<ImageUpload> {
    let content_type = content_type
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AppError::bad_request("image content type is missing"))?;

    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::bad_request(
            "only JPEG, PNG and WebP images are allowed",
        ));
    }
    if bytes.is_empty() {
        return Err(AppError::bad_request("image is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::bad_request("image must be smaller than 5MB"));
    }

    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp"))
        .unwrap_or_else(|| match content_type.as_str() {
            "image/png" => "png".into(),
            "image/webp" => "webp".into(),
            _ => "jpg".into(),
        });

    Ok(ImageUpload {
        content_type,
        extension,
        bytes,
    })
}

pub fn profile_image_path(user_id: Uuid, extension: &str) -> String {
    format!("{}/{}.{}", user_id, Uuid::new_v4(), extension)
}

pub fn team_logo_path(team_id: Uuid, extension: &str) -> String {
    format!("teams/{}/{}.{}", team_id, Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> ObjectStorage {
        let mut config = crate::utils::test_config();
        config.storage_url = Some("https://store.example.com/".into());
        config.storage_service_key = Some("service".into());
        ObjectStorage::from_config(&config).unwrap()
    }

    #[test]
    fn storage_requires_url_and_key() {
        assert!(ObjectStorage::from_config(&crate::utils::test_config()).is_none());
    }

    #[test]
    fn public_url_maps_back_to_path() {
        let storage = storage();
        let url = storage.public_url(PROFILE_BUCKET, "u1/abc.png");
        assert_eq!(
            url,
            "https://store.example.com/storage/v1/object/public/profile-images/u1/abc.png"
        );
        assert_eq!(storage.object_path(PROFILE_BUCKET, &url).as_deref(), Some("u1/abc.png"));
        assert_eq!(storage.object_path(TEAM_LOGO_BUCKET, &url), None);
        assert_eq!(storage.object_path(PROFILE_BUCKET, "https://elsewhere/x.png"), None);
    }

    #[test]
    fn rejects_unsupported_types() {
        let err = validate_image(Some("image/gif"), Some("a.gif"), vec![1, 2, 3]);
        assert!(matches!(err, Err(AppError::BadRequest(_))));
        assert!(validate_image(None, Some("a.png"), vec![1]).is_err());
    }

    #[test]
    fn rejects_oversized_images() {
        let err = validate_image(Some("image/png"), None, vec![0; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn extension_falls_back_to_content_type() {
        let upload = validate_image(Some("image/webp"), Some("noext"), vec![1]).unwrap();
        assert_eq!(upload.extension, "webp");
        let upload = validate_image(Some("IMAGE/JPEG"), Some("Photo.JPEG"), vec![1]).unwrap();
        assert_eq!(upload.extension, "jpeg");
        assert_eq!(upload.content_type, "image/jpeg");
    }

    #[test]
    fn object_paths_are_scoped() {
        let user = Uuid::new_v4();
        assert!(profile_image_path(user, "png").starts_with(&format!("{}/", user)));
        assert!(team_logo_path(user, "png").starts_with(&format!("teams/{}/", user)));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::CloudinaryConfig;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote blob storage for profile and cover images. Failures are plain
/// strings: callers always absorb them.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Uploads the bytes and returns the public URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        public_id: &str,
        transformation: &str,
    ) -> Result<String, String>;

    async fn destroy(&self, public_id: &str) -> Result<(), String>;

    /// Whether `url` points at an asset this host can destroy.
    fn owns(&self, url: &str) -> bool {
        url.contains("cloudinary.com")
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        log::info!("✅ Cloudinary configured for cloud '{}'", config.cloud_name);
        Ok(Self { http, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            CLOUDINARY_API_BASE, self.config.cloud_name, action
        )
    }

    fn sign(&self, params: &[(&str, String)]) -> String {
        sign_params(params, &self.config.api_secret)
    }
}

/// Cloudinary request signature: sorted `key=value` pairs joined by `&`,
/// secret appended, SHA-1 hex digest.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        public_id: &str,
        transformation: &str,
    ) -> Result<String, String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("overwrite", "false".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("transformation", transformation.to_string()),
        ];
        let signature = self.sign(&signed);

        let file = reqwest::multipart::Part::bytes(bytes)
            .file_name("upload")
            .mime_str(content_type)
            .map_err(|e| format!("Invalid content type: {}", e))?;

        let mut form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .part("file", file);
        for (key, value) in signed {
            form = form.text(key, value);
        }

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Failed to reach Cloudinary: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Cloudinary upload error: {}", response.status()));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Cloudinary response: {}", e))?;
        Ok(body.secure_url)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), String> {
        let signed = [
            ("public_id", public_id.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let signature = self.sign(&signed);

        let mut form: Vec<(&str, String)> = signed.to_vec();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("Failed to reach Cloudinary: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Cloudinary destroy error: {}", response.status()));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Cloudinary response: {}", e))?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(format!("Cloudinary destroy returned '{}'", other)),
        }
    }
}

/// Stand-in used when no credentials are configured: every upload fails so
/// the caller falls back to inline storage.
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _: Vec<u8>, _: &str, _: &str, _: &str) -> Result<String, String> {
        Err("Cloudinary not configured".to_string())
    }

    async fn destroy(&self, _: &str) -> Result<(), String> {
        Err("Cloudinary not configured".to_string())
    }
}

/// `https://res.cloudinary.com/<cloud>/image/upload/v123/trademinutes/profiles/x.jpg`
/// gives `trademinutes/profiles/x`.
pub fn extract_public_id(url: &str) -> Option<String> {
    let (_, after) = url.split_once("/upload/")?;
    let after = after.split(['?', '#']).next().unwrap_or(after);

    let mut segments: Vec<&str> = after.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(first) = segments.first() {
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());
        if is_version {
            segments.remove(0);
        }
    }

    let last = segments.pop()?;
    let stem = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };
    segments.push(stem);
    Some(segments.join("/"))
}

//! External media host client.
//!
//! Photos live on a hosted image service that applies transformations at
//! upload time. The service is reached over its JSON API; the trait exists
//! so the workflow can run against a fake in tests.

use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::HostConfig;

/// Transformation applied at upload time.
#[derive(Debug, Clone)]
pub struct UploadParams {
    pub folder: String,
    /// Both dimensions limited to this (aspect ratio preserved).
    pub max_dimension: u32,
    /// Centered text overlay on every hosted photo.
    pub watermark_text: String,
}

impl From<&HostConfig> for UploadParams {
    fn from(config: &HostConfig) -> Self {
        Self {
            folder: config.folder.clone(),
            max_dimension: config.max_dimension,
            watermark_text: config.watermark_text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostedObject {
    /// The host-side identifier, needed later for deletion.
    pub object_id: String,
    /// Public URL of the transformed image.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Deleted,
    /// The host no longer knows the object. Treated as already-clean by
    /// callers.
    NotFound,
}

pub trait MediaHost: Send + Sync {
    fn upload(&self, bytes: &[u8], params: &UploadParams) -> Result<HostedObject>;
    fn destroy(&self, object_id: &str) -> Result<DestroyOutcome>;
}

/// Pull the host object id out of a hosted URL:
/// `.../upload/v1234/camp-parks/abc123.jpg` → `camp-parks/abc123`.
pub fn extract_object_id(url: &str) -> Option<String> {
    static ID: OnceLock<Regex> = OnceLock::new();
    let re = ID.get_or_init(|| {
        Regex::new(r"/upload/(?:v\d+/)?(.+)\.[^.]+$").expect("object id pattern is valid")
    });
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct UploadRequest {
    file: String,
    folder: String,
    allowed_formats: Vec<String>,
    transformation: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Serialize)]
struct DestroyRequest {
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct CloudHost {
    endpoint: String,
    auth_header: String,
}

impl CloudHost {
    pub fn from_config(config: &HostConfig) -> Self {
        let credentials = format!("{}:{}", config.api_key, config.api_secret);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_header,
        }
    }

    fn transformation_string(params: &UploadParams) -> String {
        // Size limit, then a centered semi-transparent watermark.
        format!(
            "c_limit,w_{max},h_{max}/l_text:Arial_80_bold:{text},g_center,o_60,co_white,fl_relative",
            max = params.max_dimension,
            text = params.watermark_text,
        )
    }
}

impl MediaHost for CloudHost {
    fn upload(&self, bytes: &[u8], params: &UploadParams) -> Result<HostedObject> {
        let file = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );
        let request = UploadRequest {
            file,
            folder: params.folder.clone(),
            allowed_formats: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            transformation: Self::transformation_string(params),
        };

        let url = format!("{}/image/upload", self.endpoint);
        let response = ureq::post(&url)
            .set("Authorization", &self.auth_header)
            .send_json(&request)
            .map_err(|e| anyhow!("media host upload failed: {e}"))?;

        let parsed: UploadResponse = response
            .into_json()
            .map_err(|e| anyhow!("bad media host upload response: {e}"))?;
        Ok(HostedObject {
            object_id: parsed.public_id,
            url: parsed.secure_url,
        })
    }

    fn destroy(&self, object_id: &str) -> Result<DestroyOutcome> {
        let url = format!("{}/image/destroy", self.endpoint);
        let response = ureq::post(&url)
            .set("Authorization", &self.auth_header)
            .send_json(&DestroyRequest {
                public_id: object_id.to_string(),
            })
            .map_err(|e| anyhow!("media host delete failed: {e}"))?;

        let parsed: DestroyResponse = response
            .into_json()
            .map_err(|e| anyhow!("bad media host delete response: {e}"))?;
        match parsed.result.as_str() {
            "ok" => Ok(DestroyOutcome::Deleted),
            "not found" => Ok(DestroyOutcome::NotFound),
            other => Err(anyhow!("media host delete unsuccessful: {other}")),
        }
    }
}

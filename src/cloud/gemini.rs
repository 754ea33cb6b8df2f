//! Gemini vision backend
//!
//! Sends one `generateContent` request with the frame inlined as base64.

use super::{build_instruction, VisionService};
use crate::camera::CapturedImage;
use crate::config::Config;
use crate::error::{GuideError, GuideResult};
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the Gemini `generateContent` API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Create new client from config
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.cloud_base_url.trim_end_matches('/').to_string(),
            model: config.cloud_model.clone(),
            api_key: config.cloud_api_key.clone(),
            timeout: config.cloud_timeout(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(image: &CapturedImage, question: &str) -> serde_json::Value {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        serde_json::json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": image.mime_type, "data": data } },
                    { "text": build_instruction(question) }
                ]
            }]
        })
    }

    /// Send the frame and question, returning the model's answer
    pub async fn generate(&self, image: &CapturedImage, question: &str) -> GuideResult<String> {
        if !self.has_api_key() {
            return Err(GuideError::Cloud("no API key configured".to_string()));
        }

        info!("☁️ Asking {}: '{}'", self.model, question);
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(image, question))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            warn!("❌ Gemini API Error ({}): {}", status, body_text);
            let message = serde_json::from_str::<ErrorEnvelope>(&body_text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(GuideError::Cloud(message));
        }

        debug!("☁️ Gemini raw body: {}", body_text);
        extract_text(&body_text)?.ok_or_else(|| GuideError::Cloud("empty response".to_string()))
    }
}

/// Concatenated text parts of the first candidate, if any
fn extract_text(body: &str) -> GuideResult<Option<String>> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(text)
}

#[async_trait]
impl VisionService for GeminiClient {
    async fn describe(&self, image: &CapturedImage, question: &str) -> Result<String> {
        Ok(self.generate(image, question).await?)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

//! Image generation collaborator.
//!
//! [`HttpImageGenerator`] submits the source image and a style instruction
//! as a multipart image-edit request and returns the rendered bytes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

use crate::paths;

/// Longest slice of a response body kept in error messages
pub const MAX_ERROR_BODY_CHARS: usize = 512;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Transport(format!("request timed out: {}", err))
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render `image` according to `instruction`
    async fn generate(
        &self,
        image: &[u8],
        file_name: &str,
        instruction: &str,
    ) -> Result<Vec<u8>, GenerationError>;
}

/// Connection settings for the generation API
#[derive(Clone, Default)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenerationSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.endpoint.is_some()
    }

    /// Build an HTTP generator, or `None` when key or endpoint is missing
    pub fn build_generator(&self) -> Result<Option<Arc<dyn ImageGenerator>>, GenerationError> {
        match (&self.api_key, &self.endpoint) {
            (Some(api_key), Some(endpoint)) => {
                let generator = HttpImageGenerator::new(
                    endpoint.clone(),
                    api_key.clone(),
                    self.model.clone(),
                    self.timeout.unwrap_or(DEFAULT_TIMEOUT),
                )?;
                Ok(Some(Arc::new(generator)))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

enum DecodedImage {
    Bytes(Vec<u8>),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: Option<String>,
}

impl HttpImageGenerator {
    pub fn new(
        endpoint: String,
        api_key: String,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status,
                body: truncate_body(&body),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        image: &[u8],
        file_name: &str,
        instruction: &str,
    ) -> Result<Vec<u8>, GenerationError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(file_name.to_string())
            .mime_str(paths::mime_type(file_name))
            .map_err(|e| GenerationError::Transport(format!("Invalid image part: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("prompt", instruction.to_string())
            .text("n", "1");
        if let Some(model) = &self.model {
            form = form.text("model", model.clone());
        }

        tracing::debug!(file_name, endpoint = %self.endpoint, "Submitting image to generation API");

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response.bytes().await?;

        match decode_response(&content_type, &body)? {
            DecodedImage::Bytes(bytes) => Ok(bytes),
            DecodedImage::Url(url) => self.fetch_url(&url).await,
        }
    }
}

fn decode_response(content_type: &str, body: &[u8]) -> Result<DecodedImage, GenerationError> {
    if content_type.starts_with("image/") || content_type == "application/octet-stream" {
        if body.is_empty() {
            return Err(GenerationError::InvalidResponse("empty image body".to_string()));
        }
        return Ok(DecodedImage::Bytes(body.to_vec()));
    }

    let parsed: ImageResponse = serde_json::from_slice(body).map_err(|e| {
        GenerationError::InvalidResponse(format!(
            "{} (body: {})",
            e,
            truncate_body(&String::from_utf8_lossy(body))
        ))
    })?;

    let first = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::InvalidResponse("response contained no images".to_string()))?;

    if let Some(encoded) = first.b64_json {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| GenerationError::InvalidResponse(format!("bad base64 payload: {}", e)))?;
        return Ok(DecodedImage::Bytes(bytes));
    }
    if let Some(url) = first.url {
        return Ok(DecodedImage::Url(url));
    }

    Err(GenerationError::InvalidResponse(
        "image entry has neither b64_json nor url".to_string(),
    ))
}

/// Keep error bodies short enough for a JSON report
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  short  "), "short");

        let long = "x".repeat(2000);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_decode_raw_image() {
        match decode_response("image/png", b"\x89PNG").unwrap() {
            DecodedImage::Bytes(bytes) => assert_eq!(bytes, b"\x89PNG"),
            DecodedImage::Url(_) => panic!("expected bytes"),
        }
        assert!(decode_response("image/png", b"").is_err());
    }

    #[test]
    fn test_decode_b64_json() {
        let body = format!(r#"{{"data": [{{"b64_json": "{}"}}]}}"#, BASE64.encode(b"styled"));
        match decode_response("application/json", body.as_bytes()).unwrap() {
            DecodedImage::Bytes(bytes) => assert_eq!(bytes, b"styled"),
            DecodedImage::Url(_) => panic!("expected bytes"),
        }
    }

    #[test]
    fn test_decode_url_and_errors() {
        let body = br#"{"data": [{"url": "https://cdn.example.com/a.png"}]}"#;
        match decode_response("application/json", body).unwrap() {
            DecodedImage::Url(url) => assert_eq!(url, "https://cdn.example.com/a.png"),
            DecodedImage::Bytes(_) => panic!("expected url"),
        }

        assert!(matches!(
            decode_response("application/json", br#"{"data": []}"#),
            Err(GenerationError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_response("text/html", b"<html>oops</html>"),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_settings_require_key_and_endpoint() {
        let mut settings = GenerationSettings {
            api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(!settings.is_configured());
        assert!(settings.build_generator().unwrap().is_none());

        settings.endpoint = Some("https://images.example.com/v1/images/edits".into());
        assert!(settings.is_configured());
        assert!(settings.build_generator().unwrap().is_some());
        assert!(!format!("{:?}", settings).contains("\"key\""));
    }
}

//! OCR collaborator for image CAPTCHAs.

use crate::error::{EngineError, OcrResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Recognizes the text in a CAPTCHA image.
///
/// Implementations may return an empty string when nothing is recognized;
/// the caller treats that as a miss, not an error.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Recognize the text in a PNG image.
    async fn recognize(&self, image: &[u8]) -> OcrResult<String>;
}

/// Client for an HTTP OCR sidecar: posts base64 PNG as JSON, reads the
/// recognized text back.
pub struct HttpOcrClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    text: String,
}

impl HttpOcrClient {
    /// Build a client for the sidecar at `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> OcrResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Ocr(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn recognize(&self, image: &[u8]) -> OcrResult<String> {
        let payload = serde_json::json!({ "image": STANDARD.encode(image) });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::Ocr(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| EngineError::Ocr(format!("sidecar rejected request: {e}")))?;
        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Ocr(format!("malformed response: {e}")))?;
        debug!(len = body.text.len(), "OCR response received");
        Ok(body.text)
    }
}

/// OCR that recognizes nothing. Used when no sidecar is configured.
pub struct NullOcr;

#[async_trait]
impl OcrClient for NullOcr {
    async fn recognize(&self, _image: &[u8]) -> OcrResult<String> {
        Ok(String::new())
    }
}

/// Reduce recognized text to the alphanumerics CAPTCHA answers use.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer(" a B-3 9\n"), "aB39");
        assert_eq!(normalize_answer("んにちは"), "");
        assert_eq!(normalize_answer(""), "");
    }

    #[tokio::test]
    async fn test_null_ocr_recognizes_nothing() {
        let text = NullOcr.recognize(&[1, 2, 3]).await.expect("null OCR");
        assert!(text.is_empty());
    }

    #[test]
    fn test_recognize_response_defaults() {
        let body: RecognizeResponse = serde_json::from_str("{}").expect("parse empty object");
        assert!(body.text.is_empty());
        let body: RecognizeResponse =
            serde_json::from_str(r#"{"text": "x7k2"}"#).expect("parse response");
        assert_eq!(body.text, "x7k2");
    }
}

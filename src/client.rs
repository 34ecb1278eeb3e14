//! Google Gemini API client for instruction-driven image edits
//!
//! Thin wrapper around the `generateContent` endpoint: one inline image plus
//! one text instruction in, one inline image out.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EditError, EditResult};

const DEFAULT_RESULT_MIME: &str = "image/png";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// An image produced by the service, still Base64 encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditedImage {
    pub data: String,
    pub mime_type: String,
}

/// Anything that can turn an image plus an instruction into a new image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn generate_edit(
        &self,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> EditResult<EditedImage>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

// -- Response types --

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    inline_data: Option<GeminiInlineData>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> EditResult<Self> {
        Self::with_api_key(config, config.api_key())
    }

    /// Build a client with an explicitly resolved key.
    pub fn with_api_key(config: &Config, api_key: Option<String>) -> EditResult<Self> {
        let api_key = api_key.ok_or_else(|| {
            EditError::Config(
                "Gemini API key is missing. Set GEMINI_API_KEY or add api_key to the config file."
                    .to_string(),
            )
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| EditError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn build_request_body(
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": image_base64
                        }
                    },
                    {"text": instruction}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"]
            }
        })
    }

    /// First candidate, first non-empty inline image part. Everything else
    /// is ignored. A payload that is not valid Base64 is a transport error.
    pub fn extract_image(response: &GeminiResponse) -> EditResult<EditedImage> {
        let parts = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();
        if let Some(text) = parts.iter().find_map(|p| p.text.as_deref()) {
            info!("Gemini returned text alongside the edit: {} chars", text.len());
        }
        let inline = parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.trim().is_empty())
            .ok_or(EditError::NoImageReturned)?;

        if let Err(e) = STANDARD.decode(inline.data.trim()) {
            warn!("Gemini image payload is not valid Base64: {}", e);
            return Err(EditError::transport(
                "Gemini returned a malformed image payload",
            ));
        }

        Ok(EditedImage {
            data: inline.data.trim().to_string(),
            mime_type: inline
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_RESULT_MIME.to_string()),
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl ImageEditor for GeminiClient {
    async fn generate_edit(
        &self,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> EditResult<EditedImage> {
        if !mime_type.starts_with("image/") {
            return Err(EditError::invalid_file_type(mime_type));
        }
        if image_base64.is_empty() {
            return Err(EditError::transport("Image payload is empty"));
        }
        if instruction.trim().is_empty() {
            return Err(EditError::EmptyInstruction);
        }

        let body = Self::build_request_body(image_base64, mime_type, instruction);

        info!(
            "Gemini image edit: model={} image={} ({} b64 chars) prompt={} chars",
            self.model,
            mime_type,
            image_base64.len(),
            instruction.len()
        );

        let response = self
            .client
            .post(self.url())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(
                "x-goog-api-key",
                HeaderValue::from_str(&self.api_key)
                    .map_err(|e| EditError::Config(format!("Invalid API key header: {}", e)))?,
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| EditError::transport(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Truncate error body to avoid leaking sensitive data
            let truncated: String = error_body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!("Gemini API error {}", status);
            return Err(EditError::transport(format!(
                "Gemini API error {}: {}",
                status, truncated
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            EditError::transport(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::extract_image(&gemini_response)
    }
}

/// Stand-in used when no client could be built; every attempt reports why.
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ImageEditor for Unconfigured {
    async fn generate_edit(
        &self,
        _image_base64: &str,
        _mime_type: &str,
        _instruction: &str,
    ) -> EditResult<EditedImage> {
        Err(EditError::Config(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config_for(endpoint: &str) -> Config {
        Config {
            endpoint: endpoint.to_string(),
            ..Config::default()
        }
    }

    fn client_for(endpoint: &str) -> GeminiClient {
        GeminiClient::with_api_key(&config_for(endpoint), Some("test-key-123".to_string()))
            .unwrap()
    }

    /// Serve exactly one HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{}/v1beta/models", addr), handle)
    }

    #[test]
    fn test_build_request_body() {
        let body = GeminiClient::build_request_body("QUJD", "image/jpeg", "make it vintage");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], "make it vintage");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn test_parse_response_valid() {
        let response_json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        let image = GeminiClient::extract_image(&response).unwrap();
        assert_eq!(image.data, "iVBORw0KGgo=");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_only_first_candidate_is_used() {
        let response_json = serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"inlineData": {"data": "Rmlyc3Q="}}]}},
                {"content": {"parts": [{"inlineData": {"data": "U2Vjb25k"}}]}}
            ]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        let image = GeminiClient::extract_image(&response).unwrap();
        assert_eq!(image.data, "Rmlyc3Q=");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_parse_response_no_image() {
        let response_json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": "I cannot edit that image"}]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        assert!(matches!(
            GeminiClient::extract_image(&response),
            Err(EditError::NoImageReturned)
        ));
    }

    #[test]
    fn test_parse_blocked_prompt() {
        // Blocked prompts come back with feedback and no candidates at all.
        let response_json = serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        assert!(matches!(
            GeminiClient::extract_image(&response),
            Err(EditError::NoImageReturned)
        ));

        let response_json = serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        assert!(matches!(
            GeminiClient::extract_image(&response),
            Err(EditError::NoImageReturned)
        ));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = GeminiClient::with_api_key(&Config::default(), None);
        assert!(matches!(result, Err(EditError::Config(_))));
    }

    #[test]
    fn test_empty_inline_data_is_no_image() {
        let response_json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"inlineData": {"mimeType": "image/png", "data": ""}}]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        assert!(matches!(
            GeminiClient::extract_image(&response),
            Err(EditError::NoImageReturned)
        ));
    }

    #[test]
    fn test_empty_part_is_skipped_for_next_image() {
        let response_json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"inlineData": {"data": "  "}},
                        {"inlineData": {"mimeType": "image/webp", "data": "QUJD"}}
                    ]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        let image = GeminiClient::extract_image(&response).unwrap();
        assert_eq!(image.data, "QUJD");
        assert_eq!(image.mime_type, "image/webp");
    }

    #[test]
    fn test_garbage_inline_data_is_transport_error() {
        let response_json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"inlineData": {"data": "%%% not base64 %%%"}}]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(response_json).unwrap();
        match GeminiClient::extract_image(&response) {
            Err(EditError::Transport(msg)) => assert!(msg.contains("malformed")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_url_uses_model() {
        let client = client_for("https://example.test/models/");
        assert_eq!(
            client.url(),
            "https://example.test/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[tokio::test]
    async fn test_rejects_non_image_mime() {
        let client = client_for("http://127.0.0.1:1");
        let err = client
            .generate_edit("QUJD", "text/plain", "make it vintage")
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidFileType { .. }));
    }

    #[tokio::test]
    async fn test_rejects_blank_instruction() {
        let client = client_for("http://127.0.0.1:1");
        let err = client.generate_edit("QUJD", "image/png", "  ").await.unwrap_err();
        assert!(matches!(err, EditError::EmptyInstruction));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let client = client_for("http://127.0.0.1:1");
        let err = client
            .generate_edit("QUJD", "image/png", "make it vintage")
            .await
            .unwrap_err();
        match err {
            EditError::Transport(msg) => assert!(msg.starts_with("Gemini API request failed")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_edit_over_http() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"QUJD"}}]}}]}"#;
        let (endpoint, server) = serve_once("200 OK", body).await;
        let client = client_for(&endpoint);

        let image = client
            .generate_edit("aW5wdXQ=", "image/jpeg", "make it vintage")
            .await
            .unwrap();
        assert_eq!(image.data, "QUJD");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash-image:generateContent"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key-123"));
        assert!(request.contains("make it vintage"));
        assert!(request.contains("aW5wdXQ="));
    }

    #[tokio::test]
    async fn test_quota_error_is_transport_error() {
        let (endpoint, server) =
            serve_once("429 Too Many Requests", r#"{"error":{"message":"quota"}}"#).await;
        let client = client_for(&endpoint);

        let err = client
            .generate_edit("QUJD", "image/png", "remove the background")
            .await
            .unwrap_err();
        match err {
            EditError::Transport(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("quota"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_text_only_answer_is_no_image() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#;
        let (endpoint, server) = serve_once("200 OK", body).await;
        let client = client_for(&endpoint);

        let err = client
            .generate_edit("QUJD", "image/png", "remove the background")
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::NoImageReturned));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_reports_reason() {
        let editor = Unconfigured::new("no key");
        let err = editor.generate_edit("QUJD", "image/png", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "no key");
    }
}

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash-latest";

#[derive(Clone, Debug)]
pub struct GeminiClientConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    /// `None` leaves requests without a deadline.
    pub timeout: Option<Duration>,
    pub max_error_body_bytes: usize,
}

impl GeminiClientConfig {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let embedding_model = std::env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        let generation_model = std::env::var("GEMINI_GENERATION_MODEL")
            .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string());

        let timeout = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let max_error_body_bytes = std::env::var("GEMINI_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model,
            generation_model,
            timeout,
            max_error_body_bytes,
        }
    }

    /// Defaults pointed at an arbitrary base URL.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout: None,
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },
}

/// Thin client for the Generative Language REST API.
///
/// The API key is supplied per call rather than per client: the session owns the
/// credential and may change it at any time.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiClientConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, GeminiClientError> {
        let http = reqwest::Client::builder()
            .user_agent("persona-strategy")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiClientConfig {
        &self.config
    }

    /// Embed a batch of texts with one `batchEmbedContents` call.
    ///
    /// The returned vectors are index-aligned with `texts` when the upstream behaves;
    /// callers validate the shape.
    pub async fn batch_embed_contents(
        &self,
        texts: &[String],
        task_type: &str,
        api_key: &str,
    ) -> Result<Vec<Vec<f32>>, GeminiClientError> {
        let model = &self.config.embedding_model;
        let url = format!("{}/models/{model}:batchEmbedContents", self.config.base_url);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: format!("models/{model}"),
                    content: Content::from_text(text),
                    task_type: task_type.to_string(),
                })
                .collect(),
        };

        let resp = self.post(&url, api_key).json(&body).send().await?;
        let parsed: BatchEmbedResponse =
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await?;
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    /// Run a single-turn prompt with `generateContent` and return the raw response.
    pub async fn generate_content(
        &self,
        prompt: &str,
        api_key: &str,
    ) -> Result<GenerateContentResponse, GeminiClientError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.generation_model
        );
        let body = GenerateContentRequest {
            contents: vec![Content::from_text(prompt)],
        };

        let resp = self.post(&url, api_key).json(&body).send().await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    fn post(&self, url: &str, api_key: &str) -> reqwest::RequestBuilder {
        let req = self.http.post(url).header("x-goog-api-key", api_key);
        match self.config.timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, GeminiClientError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice::<T>(&bytes)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> GeminiClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<GeminiErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return GeminiClientError::Upstream { status, message };
        }
        GeminiClientError::UpstreamBody { status, body }
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorObject,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorObject {
    message: Option<String>,
    #[allow(dead_code)]
    code: Option<i64>,
    #[allow(dead_code)]
    status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    fn from_text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if it produced any text.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u64>,
    pub candidates_token_count: Option<u64>,
    pub total_token_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> GeminiClient {
        GeminiClient::new(GeminiClientConfig::with_base_url(&server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_batch_embed_contents_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/text-embedding-004:batchEmbedContents")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""taskType":"RETRIEVAL_DOCUMENT""#.to_string()),
                Matcher::Regex(r#""model":"models/text-embedding-004""#.to_string()),
                Matcher::Regex(r#""text":"second""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = client
            .batch_embed_contents(&texts, "RETRIEVAL_DOCUMENT", "test-key")
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_upstream_error_envelope_is_parsed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/text-embedding-004:batchEmbedContents")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .batch_embed_contents(&["x".to_string()], "RETRIEVAL_QUERY", "bad-key")
            .await
            .unwrap_err();

        match err {
            GeminiClientError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash-latest:generateContent")
            .with_status(503)
            .with_body("service unavailable")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.generate_content("hi", "k").await.unwrap_err();

        match err {
            GeminiClientError::UpstreamBody { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "service unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_content_joins_parts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash-latest:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {"parts": [{"text": "Hello, "}, {"text": "world"}], "role": "model"},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let resp = client.generate_content("say hello", "test-key").await.unwrap();

        assert_eq!(resp.text().as_deref(), Some("Hello, world"));
        assert_eq!(
            resp.usage_metadata.and_then(|u| u.total_token_count),
            Some(5)
        );
    }

    #[test]
    fn test_text_is_none_without_candidates() {
        let resp: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(resp.text().is_none());
    }
}

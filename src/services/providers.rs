// AI Provider Service
// OpenAI-compatible chat completion client (OpenRouter by default)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

pub const OPENROUTER_DEFAULT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OPENROUTER_DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: i32 = 4000;
pub const DEFAULT_REFERER: &str = "https://legally.kz";
pub const DEFAULT_TITLE: &str = "Legally AI Risk Analyzer";
const UNSPECIFIED_UPSTREAM_ERROR: &str = "upstream returned an error without a message";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("API error: status {status}")]
    ApiError { status: u16, message: String },
    #[error("API returned an error: {0}")]
    UpstreamError(String),
    #[error("empty answer from upstream")]
    EmptyAnswer,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

impl ProviderError {
    /// Timeouts, transport failures, 5xx and 429 may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::HttpError(e) => e.is_timeout() || e.is_connect(),
            ProviderError::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Endpoint and request parameters for the chat provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: i32,
    pub timeout_secs: u64,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub proxy: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: OPENROUTER_DEFAULT_URL.to_string(),
            model: OPENROUTER_DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            referer: Some(DEFAULT_REFERER.to_string()),
            title: Some(DEFAULT_TITLE.to_string()),
            proxy: None,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl ProviderSettings {
    /// The configured key, if present and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ErrorEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// Interpret a chat completion response.
///
/// Returns the first choice's content unmodified. A non-2xx status, an
/// unparseable body, an `error` envelope, zero choices and empty content are
/// each reported as their own [`ProviderError`] variant.
pub fn parse_chat_response(status: u16, body: &str) -> Result<String, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(ProviderError::ApiError {
            status,
            message: body.to_string(),
        });
    }

    let data: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::JsonError(e.to_string()))?;

    if let Some(envelope) = data.error {
        let message = envelope
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNSPECIFIED_UPSTREAM_ERROR.to_string());
        return Err(ProviderError::UpstreamError(message));
    }

    data.choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .ok_or(ProviderError::EmptyAnswer)
}

pub struct ProviderClient {
    client: Client,
    settings: ProviderSettings,
}

impl ProviderClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(proxy_url) = settings.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;
        Ok(Self { client, settings })
    }

    /// Use a pre-built HTTP client; the per-request timeout from `settings`
    /// still applies.
    pub fn with_client(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Fails with [`ProviderError::MissingApiKey`] when no key is configured.
    pub fn ensure_configured(&self) -> Result<(), ProviderError> {
        self.settings
            .api_key()
            .map(|_| ())
            .ok_or(ProviderError::MissingApiKey)
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatResult, ProviderError> {
        let api_key = self.settings.api_key().ok_or(ProviderError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!(
            endpoint = %self.settings.endpoint,
            model = %self.settings.model,
            prompt_chars = user.chars().count(),
            "[PROVIDER] -> chat request"
        );

        let start = Instant::now();
        let timeout_secs = self.settings.timeout_secs;

        let mut builder = self
            .client
            .post(&self.settings.endpoint)
            .timeout(Duration::from_secs(timeout_secs))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json");
        if let Some(referer) = self.settings.referer.as_deref() {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = self.settings.title.as_deref() {
            builder = builder.header("X-Title", title);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout_secs))?;
        let latency_ms = start.elapsed().as_millis() as i64;

        info!(
            status = status.as_u16(),
            bytes = body.len(),
            latency_ms,
            "[PROVIDER] <- chat response"
        );

        let content = parse_chat_response(status.as_u16(), &body).map_err(|e| {
            if let ProviderError::ApiError { status, message } = &e {
                warn!("[PROVIDER] error body (status {}): {}", status, message);
            }
            e
        })?;

        Ok(ChatResult {
            content,
            latency_ms,
        })
    }
}

fn transport_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::HttpError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings_for(endpoint: &str, key: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            endpoint: endpoint.to_string(),
            api_key: key.map(str::to_string),
            timeout_secs: 5,
            ..ProviderSettings::default()
        }
    }

    fn test_client(settings: ProviderSettings) -> ProviderClient {
        let http = Client::builder().no_proxy().build().unwrap();
        ProviderClient::with_client(http, settings)
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Accept one connection, capture the raw request and answer with
    /// `status_line` + `body`.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

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
                if let Some(end) = find_header_end(&buf) {
                    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let content_length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{}/api/v1/chat/completions", addr), handle)
    }

    #[test]
    fn test_parse_returns_first_choice_unmodified() {
        let body = r#"{"choices":[{"message":{"content":"  Риск: высокий\n"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(parse_chat_response(200, body).unwrap(), "  Риск: высокий\n");
    }

    #[test]
    fn test_parse_rejects_non_success_status() {
        let err = parse_chat_response(429, r#"{"error":{"message":"rate limited"}}"#).unwrap_err();
        match err {
            ProviderError::ApiError { status, .. } => assert_eq!(status, 429),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_empty_answers() {
        assert!(matches!(
            parse_chat_response(200, r#"{"choices":[]}"#),
            Err(ProviderError::EmptyAnswer)
        ));
        assert!(matches!(
            parse_chat_response(200, r#"{"choices":[{"message":{"content":""}}]}"#),
            Err(ProviderError::EmptyAnswer)
        ));
        assert!(matches!(
            parse_chat_response(200, r#"{"choices":[{"message":{}}]}"#),
            Err(ProviderError::EmptyAnswer)
        ));
        assert!(matches!(
            parse_chat_response(200, r#"{"id":"gen-1"}"#),
            Err(ProviderError::EmptyAnswer)
        ));
    }

    #[test]
    fn test_parse_error_envelope_and_garbage() {
        let err = parse_chat_response(200, r#"{"error":{"message":"model overloaded","code":502}}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamError(ref m) if m == "model overloaded"));

        assert!(matches!(
            parse_chat_response(200, "<html>bad gateway</html>"),
            Err(ProviderError::JsonError(_))
        ));
    }

    #[test]
    fn test_error_envelope_wins_over_choices() {
        let with_blank_message =
            r#"{"error":{"message":"  "},"choices":[{"message":{"content":"ok"}}]}"#;
        assert!(matches!(
            parse_chat_response(200, with_blank_message),
            Err(ProviderError::UpstreamError(ref m)) if m == UNSPECIFIED_UPSTREAM_ERROR
        ));

        let code_only = r#"{"error":{"code":400},"choices":[{"message":{"content":"ok"}}]}"#;
        assert!(matches!(
            parse_chat_response(200, code_only),
            Err(ProviderError::UpstreamError(_))
        ));

        let null_error = r#"{"error":null,"choices":[{"message":{"content":"ok"}}]}"#;
        assert_eq!(parse_chat_response(200, null_error).unwrap(), "ok");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout(120).is_transient());
        assert!(ProviderError::ApiError { status: 503, message: String::new() }.is_transient());
        assert!(ProviderError::ApiError { status: 429, message: String::new() }.is_transient());
        assert!(!ProviderError::ApiError { status: 401, message: String::new() }.is_transient());
        assert!(!ProviderError::EmptyAnswer.is_transient());
        assert!(!ProviderError::MissingApiKey.is_transient());
    }

    #[test]
    fn test_settings_debug_hides_key() {
        let settings = settings_for(OPENROUTER_DEFAULT_URL, Some("sk-secret"));
        let dbg = format!("{:?}", settings);
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("***"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // Nothing listens on port 9; a network attempt would surface as HttpError.
        let client = test_client(settings_for("http://127.0.0.1:9/v1", Some("   ")));
        assert!(matches!(client.ensure_configured(), Err(ProviderError::MissingApiKey)));
        let err = client.chat("system", "user").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_chat_request_wire_format() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"Правовые риски: нет"}}]}"#,
        )
        .await;
        let client = test_client(settings_for(&url, Some("test-key")));

        let result = client.chat("expert", "Документ:\nтекст").await.unwrap();
        assert_eq!(result.content, "Правовые риски: нет");

        let raw = server.await.unwrap();
        let lower = raw.to_lowercase();
        assert!(lower.starts_with("post /api/v1/chat/completions"));
        assert!(lower.contains("authorization: bearer test-key"));
        assert!(lower.contains("x-title: legally ai risk analyzer"));

        let body_start = raw.find("\r\n\r\n").unwrap() + 4;
        let body: serde_json::Value = serde_json::from_str(&raw[body_start..]).unwrap();
        assert_eq!(body["model"], OPENROUTER_DEFAULT_MODEL);
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "expert");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Документ:\nтекст");
    }

    #[tokio::test]
    async fn test_chat_empty_choices_with_200_is_failure() {
        let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let client = test_client(settings_for(&url, Some("test-key")));

        let err = client.chat("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyAnswer));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_server_error_carries_status() {
        let (url, server) =
            serve_once("502 Bad Gateway", r#"{"error":{"message":"upstream"}}"#).await;
        let client = test_client(settings_for(&url, Some("test-key")));

        let err = client.chat("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status: 502, .. }));
        assert!(err.is_transient());
        server.await.unwrap();
    }
}

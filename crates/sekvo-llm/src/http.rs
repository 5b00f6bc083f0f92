//! HTTP plumbing shared by the vendor clients, and the production connector.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::anthropic::AnthropicClient;
use crate::bedrock::BedrockClient;
use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use crate::openai::{OpenAiCompatClient, OpenAiPreset};
use crate::profile::ProviderProfile;
use crate::vendor::{VendorClient, VendorConnector, VendorError, VendorResult};

/// Connects the built-in families to their real vendor APIs.
#[derive(Clone, Default)]
pub struct HttpConnector {
    client: reqwest::Client,
    base_urls: BTreeMap<String, String>,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point one provider at a different base URL (proxies, test servers).
    pub fn with_base_url(mut self, provider: &str, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider.to_lowercase(), url.into());
        self
    }

    fn base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.get(provider).cloned()
    }
}

#[async_trait]
impl VendorConnector for HttpConnector {
    async fn connect(
        &self,
        profile: &'static ProviderProfile,
        credential: &str,
    ) -> VendorResult<Arc<dyn VendorClient>> {
        let http = self.client.clone();
        let base_url = self.base_url(profile.name);
        debug!(provider = profile.name, base_url = ?base_url, "connecting vendor client");

        let client: Arc<dyn VendorClient> = match profile.name {
            "anthropic" => {
                let mut c = AnthropicClient::new(http, credential);
                if let Some(url) = base_url {
                    c = c.with_base_url(url);
                }
                Arc::new(c)
            }
            "openai" | "groq" | "xai" | "deepseek" => {
                let preset = OpenAiPreset::for_provider(profile.name)
                    .ok_or_else(|| VendorError::Unsupported(profile.name.to_string()))?;
                let mut c = OpenAiCompatClient::new(http, credential, preset);
                if let Some(url) = base_url {
                    c = c.with_base_url(url);
                }
                Arc::new(c)
            }
            "gemini" => {
                let mut c = GeminiClient::new(http, credential);
                if let Some(url) = base_url {
                    c = c.with_base_url(url);
                }
                Arc::new(c)
            }
            "ollama" => Arc::new(OllamaClient::new(
                http,
                base_url.as_deref().unwrap_or(credential),
            )),
            "amazon" => Arc::new(BedrockClient::connect(credential).await),
            other => {
                return Err(VendorError::Unsupported(format!(
                    "no vendor client for provider '{other}'"
                )));
            }
        };
        Ok(client)
    }
}

// ── Request helpers ────────────────────────────────────────────

/// Send a JSON body and map non-success statuses to [`VendorError`].
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    body: &Value,
) -> VendorResult<reqwest::Response> {
    let resp = request.json(body).send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status.as_u16() == 429 {
        return Err(VendorError::RateLimited);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(VendorError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn read_json(resp: reqwest::Response) -> VendorResult<Value> {
    resp.json::<Value>()
        .await
        .map_err(|e| VendorError::Decode(e.to_string()))
}

// ── Streaming helpers ──────────────────────────────────────────

/// Non-empty, trimmed lines of a response body, as they arrive.
pub(crate) fn lines(resp: reqwest::Response) -> impl Stream<Item = VendorResult<String>> + Send {
    split_lines(resp.bytes_stream())
}

/// Split a byte stream into lines. Bytes are buffered until a full line is
/// in, so a character cut across two chunks decodes intact.
pub(crate) fn split_lines<S, B, E>(bytes: S) -> impl Stream<Item = VendorResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<VendorError> + Send,
{
    try_stream! {
        futures::pin_mut!(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::<VendorError>::into)?;
            buffer.extend_from_slice(chunk.as_ref());
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = decode_line(&raw[..pos])?;
                if !line.is_empty() {
                    yield line;
                }
            }
        }
        let rest = decode_line(&buffer)?;
        if !rest.is_empty() {
            yield rest;
        }
    }
}

fn decode_line(raw: &[u8]) -> VendorResult<String> {
    std::str::from_utf8(raw)
        .map(|line| line.trim().to_string())
        .map_err(|e| VendorError::Decode(format!("invalid UTF-8 in stream: {e}")))
}

/// JSON payloads of a server-sent-events body. Stops at `[DONE]`.
pub(crate) fn sse_events(resp: reqwest::Response) -> impl Stream<Item = VendorResult<Value>> + Send {
    sse_from(lines(resp))
}

fn sse_from<L>(lines: L) -> impl Stream<Item = VendorResult<Value>> + Send
where
    L: Stream<Item = VendorResult<String>> + Send,
{
    try_stream! {
        futures::pin_mut!(lines);
        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                break;
            }
            let event: Value = serde_json::from_str(data)
                .map_err(|e| VendorError::Decode(format!("bad event: {e}")))?;
            yield event;
        }
    }
}

/// JSON objects of a newline-delimited JSON body.
pub(crate) fn ndjson_events(
    resp: reqwest::Response,
) -> impl Stream<Item = VendorResult<Value>> + Send {
    try_stream! {
        let lines = lines(resp);
        futures::pin_mut!(lines);
        while let Some(line) = lines.next().await {
            let line = line?;
            let event: Value = serde_json::from_str(&line)
                .map_err(|e| VendorError::Decode(format!("bad line: {e}")))?;
            yield event;
        }
    }
}

/// Map decoded events to tokens with a per-vendor extractor.
///
/// `extract` returns `Ok(None)` for events that carry no text.
pub(crate) fn tokens_from<S, F>(events: S, extract: F) -> crate::vendor::AsyncTokens
where
    S: Stream<Item = VendorResult<Value>> + Send + 'static,
    F: Fn(&Value) -> VendorResult<Option<String>> + Send + Sync + 'static,
{
    Box::pin(events.filter_map(move |event| {
        let token = match event {
            Ok(event) => extract(&event).transpose(),
            Err(e) => Some(Err(e)),
        };
        futures::future::ready(token)
    }))
}

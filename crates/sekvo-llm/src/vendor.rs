//! The seam between the provider adapter and concrete vendor clients.
//!
//! A vendor client only knows how to turn a [`TextRequest`] into text (and,
//! optionally, tokens, structured values or tool definitions). Credentials,
//! defaults and capability gating live in the adapter.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use sekvo_core::{ChatMessage, Role, Tool};

use crate::profile::ProviderProfile;
use crate::provider::{Capabilities, ResponseSchema};

/// One generation call, fully resolved: every default has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    /// The user prompt as given by the caller.
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    /// `None` means "do not send a limit".
    pub max_tokens: Option<u32>,
    /// Set only for providers that take the system prompt as a dedicated parameter.
    pub system: Option<String>,
    /// Set only for providers that take the system prompt as a leading message.
    pub messages: Option<Vec<ChatMessage>>,
}

impl TextRequest {
    /// The messages to send: the explicit list, or the prompt as a single user turn.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        match &self.messages {
            Some(messages) => messages.clone(),
            None => vec![ChatMessage::user(self.prompt.clone())],
        }
    }

    /// System text from either carrier, for vendors that need it out of band.
    pub fn system_text(&self) -> Option<String> {
        if let Some(ref system) = self.system {
            return Some(system.clone());
        }
        let joined: Vec<&str> = self
            .messages
            .iter()
            .flatten()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined.join("\n"))
        }
    }

    /// Conversation without system turns, for vendors that carry the system text separately.
    pub fn turns(&self) -> Vec<ChatMessage> {
        self.conversation()
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect()
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum VendorError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited by vendor")]
    RateLimited,

    #[error("could not decode vendor response: {0}")]
    Decode(String),

    #[error("{0}")]
    Stream(String),

    #[error("sdk error: {0}")]
    Sdk(String),

    #[error("not supported by this vendor: {0}")]
    Unsupported(String),
}

pub type VendorResult<T> = std::result::Result<T, VendorError>;

// ── Token sources ──────────────────────────────────────────────

/// A synchronous token producer. Drained on a blocking worker thread.
pub type BlockingTokens = Box<dyn Iterator<Item = VendorResult<String>> + Send>;

/// An asynchronous token producer. Drained on a spawned task.
pub type AsyncTokens = Pin<Box<dyn Stream<Item = VendorResult<String>> + Send>>;

/// What a streaming vendor hands back: tokens in vendor order, possibly empty ones.
pub enum TokenSource {
    Blocking(BlockingTokens),
    Async(AsyncTokens),
}

// ── Client traits ──────────────────────────────────────────────

/// A connected vendor client.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// What this client advertises. Read once, right after connecting.
    fn capabilities(&self) -> Capabilities;

    /// Produce the complete response text.
    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String>;

    /// Token-producing method, if the client has one.
    fn as_streaming(&self) -> Option<&dyn StreamingVendor> {
        None
    }

    /// Schema-constrained generation, if the client has it.
    fn as_structured(&self) -> Option<&dyn StructuredVendor> {
        None
    }

    /// Conversion of neutral tool definitions, if the client has it.
    fn as_tooling(&self) -> Option<&dyn ToolingVendor> {
        None
    }
}

#[async_trait]
pub trait StreamingVendor: Send + Sync {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource>;
}

#[async_trait]
pub trait StructuredVendor: Send + Sync {
    async fn structured(&self, request: &TextRequest, schema: &ResponseSchema)
    -> VendorResult<Value>;
}

pub trait ToolingVendor: Send + Sync {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>>;
}

/// Builds vendor clients. Called at most once per provider instance.
#[async_trait]
pub trait VendorConnector: Send + Sync {
    /// `credential` is exactly the one field the provider family requires
    /// (API key, host URL or AWS profile name).
    async fn connect(
        &self,
        profile: &'static ProviderProfile,
        credential: &str,
    ) -> VendorResult<Arc<dyn VendorClient>>;
}

/// Parse a model reply that should be a JSON document.
pub(crate) fn parse_json_reply(text: &str) -> VendorResult<Value> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|t| t.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(trimmed).map_err(|e| VendorError::Decode(format!("reply is not JSON: {e}")))
}

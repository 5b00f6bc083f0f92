use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use sekvo_core::{ProviderConfig, Result, SekvoError, Tool};

/// What a provider instance can do. Fixed once its vendor client is initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub structured_responses: bool,
}

/// A caller-supplied JSON schema describing a structured response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Short identifier, used where vendors want a name (tool name, schema name).
    pub name: String,
    pub description: Option<String>,
    pub schema: Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check a value against the schema, collecting every violation.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let validator = jsonschema::validator_for(&self.schema)
            .map_err(|e| SekvoError::SchemaValidation(format!("invalid schema: {e}")))?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|err| format!("{} at {}", err, err.instance_path))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SekvoError::SchemaValidation(errors.join("; ")))
        }
    }
}

/// Tokens of one streaming generation, in vendor order.
///
/// Finite and single-consumer. Dropping it stops the producer at its next send.
pub struct TokenStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl TokenStream {
    pub fn new(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx }
    }

    pub async fn next_token(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    /// Drain the stream into one string. Stops at the first `Err`.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(token) = self.next_token().await {
            text.push_str(&token?);
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// The uniform contract every provider instance satisfies.
#[async_trait]
pub trait BaseProvider: Send + Sync {
    /// Registry name, e.g. "anthropic".
    fn name(&self) -> &str;

    /// The config environment this instance was created for, if any.
    fn env_name(&self) -> Option<&str>;

    fn config(&self) -> &ProviderConfig;

    /// Fail fast on a missing or malformed credential. Makes no network calls.
    fn validate_config(&self) -> Result<()>;

    /// Build the vendor client now instead of on first use.
    async fn initialize(&self) -> Result<Capabilities>;

    /// Current capabilities. Before initialization this is a conservative default.
    fn capabilities(&self) -> Capabilities;

    fn supports_streaming(&self) -> bool {
        self.capabilities().streaming
    }

    fn supports_structured_responses(&self) -> bool {
        self.capabilities().structured_responses
    }

    /// Generate the full response text.
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;

    /// Generate a token stream. Vendor failures arrive in-band, as configured
    /// by the instance's stream error mode.
    async fn generate_stream(&self, prompt: &str, system_prompt: Option<&str>)
    -> Result<TokenStream>;

    /// Generate a value conforming to `schema`.
    async fn structured_response(&self, _prompt: &str, _schema: &ResponseSchema) -> Result<Value> {
        Err(SekvoError::unsupported(self.name(), "structured responses"))
    }

    /// Convert tool definitions into the vendor's wire shape.
    async fn make_tools(&self, _tools: &[Tool]) -> Result<Vec<Value>> {
        Err(SekvoError::unsupported(self.name(), "tools"))
    }
}

/// Structured response decoded into a caller type.
pub async fn structured_response_as<T: DeserializeOwned>(
    provider: &dyn BaseProvider,
    prompt: &str,
    schema: &ResponseSchema,
) -> Result<T> {
    let value = provider.structured_response(prompt, schema).await?;
    Ok(serde_json::from_value(value)?)
}

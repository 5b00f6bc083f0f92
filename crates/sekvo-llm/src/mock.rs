//! Mock vendor client for deterministic testing.
//!
//! Returns scripted text, tokens and structured values without making any
//! HTTP calls, and records every request it sees.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sekvo_core::Tool;

use crate::profile::ProviderProfile;
use crate::provider::{Capabilities, ResponseSchema};
use crate::vendor::*;

/// One scripted step of a token stream, or one queued `generate_text` reply.
#[derive(Debug, Clone)]
pub enum MockToken {
    Text(String),
    Error(String),
    /// Panic inside the producer.
    Panic,
}

/// A scripted token stream.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub tokens: Vec<MockToken>,
    /// Produce tokens from a blocking iterator instead of an async stream.
    pub blocking: bool,
}

/// A vendor client that plays back queued responses.
///
/// # Example
/// ```
/// use sekvo_llm::mock::MockVendor;
/// let vendor = MockVendor::new()
///     .with_response("Hello, world!")
///     .with_tokens(&["Hel", "lo"]);
/// ```
pub struct MockVendor {
    capabilities: Capabilities,
    streaming: bool,
    structured: bool,
    tooling: bool,
    responses: Mutex<VecDeque<MockToken>>,
    default_response: String,
    scripts: Mutex<VecDeque<Result<MockScript, String>>>,
    values: Mutex<VecDeque<Value>>,
    requests: Arc<Mutex<Vec<TextRequest>>>,
    pulled: Arc<AtomicUsize>,
}

impl Default for MockVendor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVendor {
    /// A vendor with every method present and every capability advertised.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities {
                streaming: true,
                structured_responses: true,
            },
            streaming: true,
            structured: true,
            tooling: true,
            responses: Mutex::new(VecDeque::new()),
            default_response: "(mock: no more queued responses)".to_string(),
            scripts: Mutex::new(VecDeque::new()),
            values: Mutex::new(VecDeque::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the advertised capabilities (methods stay present).
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Remove the token-producing method.
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    /// Remove the structured-response method.
    pub fn without_structured(mut self) -> Self {
        self.structured = false;
        self
    }

    /// Remove tool conversion.
    pub fn without_tools(mut self) -> Self {
        self.tooling = false;
        self
    }

    /// Queue a text response for `generate_text`.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(MockToken::Text(text.to_string()));
        self
    }

    /// Reply with `text` whenever the queue is empty.
    pub fn with_default_response(mut self, text: &str) -> Self {
        self.default_response = text.to_string();
        self
    }

    /// Make the next `generate_text` call panic.
    pub fn with_panicking_response(self) -> Self {
        self.responses.lock().push_back(MockToken::Panic);
        self
    }

    /// Queue a failure for `generate_text`.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockToken::Error(error.to_string()));
        self
    }

    /// Queue a blocking token script.
    pub fn with_tokens(self, tokens: &[&str]) -> Self {
        self.with_script(MockScript {
            tokens: tokens.iter().map(|t| MockToken::Text(t.to_string())).collect(),
            blocking: true,
        })
    }

    /// Queue an async token script.
    pub fn with_async_tokens(self, tokens: &[&str]) -> Self {
        self.with_script(MockScript {
            tokens: tokens.iter().map(|t| MockToken::Text(t.to_string())).collect(),
            blocking: false,
        })
    }

    /// Queue any token script.
    pub fn with_script(self, script: MockScript) -> Self {
        self.scripts.lock().push_back(Ok(script));
        self
    }

    /// Make the next attempt to open a token stream fail.
    pub fn with_stream_open_error(self, error: &str) -> Self {
        self.scripts.lock().push_back(Err(error.to_string()));
        self
    }

    /// Queue a structured value.
    pub fn with_structured(self, value: Value) -> Self {
        self.values.lock().push_back(value);
        self
    }

    /// All requests this vendor received, in order.
    pub fn recorded_requests(&self) -> Vec<TextRequest> {
        self.requests.lock().clone()
    }

    /// How many scripted tokens the producer has pulled so far.
    pub fn tokens_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    fn record(&self, request: &TextRequest) {
        self.requests.lock().push(request.clone());
    }
}

#[async_trait]
impl VendorClient for MockVendor {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        self.record(request);
        let next = self.responses.lock().pop_front();
        match next {
            Some(MockToken::Text(text)) => Ok(text),
            Some(MockToken::Error(error)) => Err(VendorError::Stream(error)),
            Some(MockToken::Panic) => panic!("mock generate_text panicked"),
            None => Ok(self.default_response.clone()),
        }
    }

    fn as_streaming(&self) -> Option<&dyn StreamingVendor> {
        if self.streaming { Some(self) } else { None }
    }

    fn as_structured(&self) -> Option<&dyn StructuredVendor> {
        if self.structured { Some(self) } else { None }
    }

    fn as_tooling(&self) -> Option<&dyn ToolingVendor> {
        if self.tooling { Some(self) } else { None }
    }
}

#[async_trait]
impl StreamingVendor for MockVendor {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource> {
        self.record(request);
        let script = match self.scripts.lock().pop_front() {
            Some(Ok(script)) => script,
            Some(Err(error)) => return Err(VendorError::Stream(error)),
            None => return Err(VendorError::Stream("no token script queued".into())),
        };

        let pulled = Arc::clone(&self.pulled);
        let items = script.tokens.into_iter().map(move |token| {
            pulled.fetch_add(1, Ordering::SeqCst);
            match token {
                MockToken::Text(text) => Ok(text),
                MockToken::Error(error) => Err(VendorError::Stream(error)),
                MockToken::Panic => panic!("mock token producer panicked"),
            }
        });

        if script.blocking {
            Ok(TokenSource::Blocking(Box::new(items)))
        } else {
            Ok(TokenSource::Async(Box::pin(futures::stream::iter(items))))
        }
    }
}

#[async_trait]
impl StructuredVendor for MockVendor {
    async fn structured(
        &self,
        request: &TextRequest,
        _schema: &ResponseSchema,
    ) -> VendorResult<Value> {
        self.record(request);
        self.values
            .lock()
            .pop_front()
            .ok_or_else(|| VendorError::Decode("no structured value queued".into()))
    }
}

impl ToolingVendor for MockVendor {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>> {
        Ok(tools
            .iter()
            .map(|t| json!({ "mock_tool": t.name, "parameters": t.parameters }))
            .collect())
    }
}

/// Hands out one shared [`MockVendor`] and counts how often it is asked to.
pub struct MockConnector {
    vendor: Arc<MockVendor>,
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Option<Duration>,
    credentials: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(vendor: Arc<MockVendor>) -> Self {
        Self {
            vendor,
            connects: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: None,
            credentials: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` connection attempts.
    pub fn failing(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep inside every connection attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn vendor(&self) -> Arc<MockVendor> {
        Arc::clone(&self.vendor)
    }

    /// Number of connection attempts so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Credentials passed to each attempt, in order.
    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().clone()
    }
}

#[async_trait]
impl VendorConnector for MockConnector {
    async fn connect(
        &self,
        _profile: &'static ProviderProfile,
        credential: &str,
    ) -> VendorResult<Arc<dyn VendorClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().push(credential.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(VendorError::Sdk("mock connection refused".into()));
        }
        Ok(Arc::clone(&self.vendor) as Arc<dyn VendorClient>)
    }
}

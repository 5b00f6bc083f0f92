use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use sekvo_core::{ChatMessage, Tool};

use crate::http::{read_json, send_json, sse_events, tokens_from};
use crate::provider::{Capabilities, ResponseSchema};
use crate::vendor::*;

/// How a chat-completions vendor constrains output to a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMode {
    /// `response_format: {type: json_schema}`.
    Schema,
    /// `response_format: {type: json_object}` plus the schema as a system instruction.
    Object,
}

/// Endpoint and dialect of one OpenAI-compatible vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenAiPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub json_mode: JsonMode,
}

impl OpenAiPreset {
    pub const OPENAI: Self = Self {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        json_mode: JsonMode::Schema,
    };
    pub const GROQ: Self = Self {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        json_mode: JsonMode::Object,
    };
    pub const XAI: Self = Self {
        name: "xai",
        base_url: "https://api.x.ai/v1",
        json_mode: JsonMode::Schema,
    };
    pub const DEEPSEEK: Self = Self {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        json_mode: JsonMode::Object,
    };

    pub fn for_provider(name: &str) -> Option<Self> {
        [Self::OPENAI, Self::GROQ, Self::XAI, Self::DEEPSEEK]
            .into_iter()
            .find(|p| p.name == name)
    }
}

/// OpenAI chat-completions client; also serves Groq, xAI and Deepseek.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    preset: OpenAiPreset,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, api_key: &str, preset: OpenAiPreset) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: preset.base_url.to_string(),
            preset,
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &TextRequest, messages: &[ChatMessage]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": &request.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Conversation with a dedicated system prompt folded in front.
    fn messages(request: &TextRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(request.conversation());
        messages
    }

    async fn post(&self, body: &Value) -> VendorResult<reqwest::Response> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);
        send_json(request, body).await
    }
}

fn message_content(data: &Value) -> VendorResult<String> {
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| VendorError::Decode("no message content in response".into()))
}

/// Token carried by one chat-completions stream chunk, if any.
pub(crate) fn stream_delta(event: &Value) -> VendorResult<Option<String>> {
    if let Some(message) = event["error"]["message"].as_str() {
        return Err(VendorError::Stream(message.to_string()));
    }
    Ok(event["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string))
}

#[async_trait]
impl VendorClient for OpenAiCompatClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            structured_responses: true,
        }
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        let body = self.build_request_body(request, &Self::messages(request));
        debug!(vendor = self.preset.name, model = %request.model, "sending chat completion");
        let data = read_json(self.post(&body).await?).await?;
        message_content(&data)
    }

    fn as_streaming(&self) -> Option<&dyn StreamingVendor> {
        Some(self)
    }

    fn as_structured(&self) -> Option<&dyn StructuredVendor> {
        Some(self)
    }

    fn as_tooling(&self) -> Option<&dyn ToolingVendor> {
        Some(self)
    }
}

#[async_trait]
impl StreamingVendor for OpenAiCompatClient {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource> {
        let mut body = self.build_request_body(request, &Self::messages(request));
        body["stream"] = json!(true);
        debug!(vendor = self.preset.name, model = %request.model, "opening chat completion stream");
        let resp = self.post(&body).await?;
        Ok(TokenSource::Async(tokens_from(sse_events(resp), stream_delta)))
    }
}

#[async_trait]
impl StructuredVendor for OpenAiCompatClient {
    async fn structured(
        &self,
        request: &TextRequest,
        schema: &ResponseSchema,
    ) -> VendorResult<Value> {
        let mut messages = Self::messages(request);
        let response_format = match self.preset.json_mode {
            JsonMode::Schema => json!({
                "type": "json_schema",
                "json_schema": { "name": schema.name, "schema": schema.schema },
            }),
            JsonMode::Object => {
                messages.insert(
                    0,
                    ChatMessage::system(format!(
                        "Respond only with a JSON object that conforms to this JSON schema: {}",
                        schema.schema
                    )),
                );
                json!({ "type": "json_object" })
            }
        };

        let mut body = self.build_request_body(request, &messages);
        body["response_format"] = response_format;
        let data = read_json(self.post(&body).await?).await?;
        parse_json_reply(&message_content(&data)?)
    }
}

impl ToolingVendor for OpenAiCompatClient {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>> {
        Ok(function_tools(tools))
    }
}

/// `{type: function, function: {...}}` entries, shared with Ollama.
pub(crate) fn function_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use sekvo_core::Tool;

use crate::http::{read_json, send_json, sse_events, tokens_from};
use crate::provider::{Capabilities, ResponseSchema};
use crate::vendor::*;

const API_VERSION: &str = "2023-06-01";
/// The Messages API requires a limit; used when the request carries none.
const UNBOUNDED_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &TextRequest) -> Value {
        let messages: Vec<Value> = request
            .turns()
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": &request.model,
            "max_tokens": request.max_tokens.unwrap_or(UNBOUNDED_MAX_TOKENS),
            "temperature": request.temperature,
            "messages": messages,
        });

        if let Some(system) = request.system_text() {
            body["system"] = json!(system);
        }
        body
    }

    async fn post(&self, body: &Value) -> VendorResult<reqwest::Response> {
        let request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        send_json(request, body).await
    }
}

/// Text of all `text` content blocks, concatenated.
fn content_text(data: &Value) -> String {
    data["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Token carried by one Messages API stream event, if any.
pub(crate) fn stream_delta(event: &Value) -> VendorResult<Option<String>> {
    match event["type"].as_str() {
        Some("content_block_delta") if event["delta"]["type"] == "text_delta" => {
            Ok(event["delta"]["text"].as_str().map(str::to_string))
        }
        Some("error") => Err(VendorError::Stream(
            event["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl VendorClient for AnthropicClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            structured_responses: true,
        }
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, "sending Anthropic API request");
        let data = read_json(self.post(&body).await?).await?;
        Ok(content_text(&data))
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
impl StreamingVendor for AnthropicClient {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource> {
        let mut body = self.build_request_body(request);
        body["stream"] = json!(true);
        debug!(model = %request.model, "opening Anthropic stream");
        let resp = self.post(&body).await?;
        Ok(TokenSource::Async(tokens_from(sse_events(resp), stream_delta)))
    }
}

#[async_trait]
impl StructuredVendor for AnthropicClient {
    async fn structured(
        &self,
        request: &TextRequest,
        schema: &ResponseSchema,
    ) -> VendorResult<Value> {
        // Forced tool use: the tool's input is the structured value.
        let mut body = self.build_request_body(request);
        body["tools"] = json!([{
            "name": schema.name,
            "description": schema
                .description
                .clone()
                .unwrap_or_else(|| format!("Record a {} object", schema.name)),
            "input_schema": schema.schema,
        }]);
        body["tool_choice"] = json!({ "type": "tool", "name": schema.name });

        let data = read_json(self.post(&body).await?).await?;
        data["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find(|b| b["type"] == "tool_use"))
            .map(|b| b["input"].clone())
            .ok_or_else(|| VendorError::Decode("no tool_use block in response".into()))
    }
}

impl ToolingVendor for AnthropicClient {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>> {
        Ok(tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect())
    }
}

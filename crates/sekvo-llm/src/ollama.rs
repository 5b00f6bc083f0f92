use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use sekvo_core::{ChatMessage, Tool};

use crate::http::{ndjson_events, read_json, send_json, tokens_from};
use crate::openai::function_tools;
use crate::provider::{Capabilities, ResponseSchema};
use crate::vendor::*;

/// Client for a local Ollama server (`/api/chat`).
pub struct OllamaClient {
    client: reqwest::Client,
    /// Address of the server, e.g. "http://127.0.0.1:11434".
    base_url: String,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, host_url: &str) -> Self {
        Self {
            client,
            base_url: host_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &TextRequest, stream: bool) -> Value {
        let mut conversation = Vec::new();
        if let Some(ref system) = request.system {
            conversation.push(ChatMessage::system(system.clone()));
        }
        conversation.extend(request.conversation());
        let messages: Vec<Value> = conversation
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut options = json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }

        json!({
            "model": &request.model,
            "messages": messages,
            "stream": stream,
            "options": options,
        })
    }

    async fn post(&self, body: &Value) -> VendorResult<reqwest::Response> {
        let request = self.client.post(format!("{}/api/chat", self.base_url));
        send_json(request, body).await
    }
}

fn message_content(data: &Value) -> String {
    data["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn stream_delta(event: &Value) -> VendorResult<Option<String>> {
    if let Some(error) = event["error"].as_str() {
        return Err(VendorError::Stream(error.to_string()));
    }
    Ok(event["message"]["content"].as_str().map(str::to_string))
}

#[async_trait]
impl VendorClient for OllamaClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            structured_responses: true,
        }
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        let body = self.build_request_body(request, false);
        debug!(model = %request.model, url = %self.base_url, "sending Ollama chat request");
        let data = read_json(self.post(&body).await?).await?;
        Ok(message_content(&data))
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
impl StreamingVendor for OllamaClient {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource> {
        let body = self.build_request_body(request, true);
        debug!(model = %request.model, url = %self.base_url, "opening Ollama stream");
        let resp = self.post(&body).await?;
        Ok(TokenSource::Async(tokens_from(ndjson_events(resp), stream_delta)))
    }
}

#[async_trait]
impl StructuredVendor for OllamaClient {
    async fn structured(
        &self,
        request: &TextRequest,
        schema: &ResponseSchema,
    ) -> VendorResult<Value> {
        let mut body = self.build_request_body(request, false);
        body["format"] = schema.schema.clone();
        let data = read_json(self.post(&body).await?).await?;
        parse_json_reply(&message_content(&data))
    }
}

impl ToolingVendor for OllamaClient {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>> {
        Ok(function_tools(tools))
    }
}

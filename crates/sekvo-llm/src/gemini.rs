use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use sekvo_core::{Role, Tool};

use crate::http::{read_json, send_json, sse_events, tokens_from};
use crate::provider::{Capabilities, ResponseSchema};
use crate::vendor::*;

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &TextRequest) -> Value {
        let contents: Vec<Value> = request
            .turns()
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation_config = json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = request.system_text() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    async fn post(&self, model: &str, method: &str, body: &Value) -> VendorResult<reqwest::Response> {
        let mut request = self
            .client
            .post(format!("{}/models/{}:{}", self.base_url, model, method))
            .header("x-goog-api-key", &self.api_key);
        if method == "streamGenerateContent" {
            request = request.query(&[("alt", "sse")]);
        }
        send_json(request, body).await
    }
}

/// Text of the first candidate's parts, concatenated.
fn candidate_text(data: &Value) -> String {
    data["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

pub(crate) fn stream_delta(event: &Value) -> VendorResult<Option<String>> {
    if let Some(message) = event["error"]["message"].as_str() {
        return Err(VendorError::Stream(message.to_string()));
    }
    Ok(Some(candidate_text(event)))
}

#[async_trait]
impl VendorClient for GeminiClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            structured_responses: true,
        }
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, "sending Gemini request");
        let data = read_json(self.post(&request.model, "generateContent", &body).await?).await?;
        Ok(candidate_text(&data))
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
impl StreamingVendor for GeminiClient {
    async fn stream_text(&self, request: &TextRequest) -> VendorResult<TokenSource> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, "opening Gemini stream");
        let resp = self
            .post(&request.model, "streamGenerateContent", &body)
            .await?;
        // Empty deltas are dropped downstream.
        Ok(TokenSource::Async(tokens_from(sse_events(resp), stream_delta)))
    }
}

#[async_trait]
impl StructuredVendor for GeminiClient {
    async fn structured(
        &self,
        request: &TextRequest,
        schema: &ResponseSchema,
    ) -> VendorResult<Value> {
        let mut body = self.build_request_body(request);
        body["generationConfig"]["responseMimeType"] = json!("application/json");
        body["generationConfig"]["responseSchema"] = schema.schema.clone();
        let data = read_json(self.post(&request.model, "generateContent", &body).await?).await?;
        parse_json_reply(&candidate_text(&data))
    }
}

impl ToolingVendor for GeminiClient {
    fn make_tools(&self, tools: &[Tool]) -> VendorResult<Vec<Value>> {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        Ok(vec![json!({ "functionDeclarations": declarations })])
    }
}

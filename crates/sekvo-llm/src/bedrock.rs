use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message, SystemContentBlock,
};
use tracing::debug;

use sekvo_core::Role;

use crate::provider::Capabilities;
use crate::vendor::*;

/// Amazon Bedrock client over the Converse API.
///
/// Credentials come from the named AWS profile. No token stream: streaming
/// requests fall back to a single generation.
pub struct BedrockClient {
    client: Client,
}

impl BedrockClient {
    /// Load the shared AWS config for `profile_name` and build a runtime client.
    pub async fn connect(profile_name: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .profile_name(profile_name)
            .load()
            .await;
        Self {
            client: Client::new(&config),
        }
    }

    fn messages(request: &TextRequest) -> VendorResult<Vec<Message>> {
        request
            .turns()
            .into_iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => ConversationRole::Assistant,
                    _ => ConversationRole::User,
                };
                Message::builder()
                    .role(role)
                    .content(ContentBlock::Text(m.content))
                    .build()
                    .map_err(|e| VendorError::Sdk(e.to_string()))
            })
            .collect()
    }

    fn inference_config(request: &TextRequest) -> InferenceConfiguration {
        let mut config = InferenceConfiguration::builder().temperature(request.temperature as f32);
        if let Some(max_tokens) = request.max_tokens {
            config = config.max_tokens(i32::try_from(max_tokens).unwrap_or(i32::MAX));
        }
        config.build()
    }
}

#[async_trait]
impl VendorClient for BedrockClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: false,
            structured_responses: false,
        }
    }

    async fn generate_text(&self, request: &TextRequest) -> VendorResult<String> {
        let mut call = self
            .client
            .converse()
            .model_id(&request.model)
            .set_messages(Some(Self::messages(request)?))
            .inference_config(Self::inference_config(request));
        if let Some(system) = request.system_text() {
            call = call.system(SystemContentBlock::Text(system));
        }

        debug!(model = %request.model, "sending Bedrock converse request");
        let output = call
            .send()
            .await
            .map_err(|e| VendorError::Sdk(DisplayErrorContext(&e).to_string()))?;

        let message = output
            .output()
            .and_then(|o| o.as_message().ok())
            .ok_or_else(|| VendorError::Decode("converse returned no message".into()))?;
        Ok(message
            .content()
            .iter()
            .filter_map(|block| block.as_text().ok())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(""))
    }
}

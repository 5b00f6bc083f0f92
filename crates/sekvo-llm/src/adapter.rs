use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use sekvo_core::{ChatMessage, CredentialField, ProviderConfig, Result, SekvoError, Tool};

use crate::profile::{ProviderProfile, SystemPromptStyle};
use crate::provider::{BaseProvider, Capabilities, ResponseSchema, TokenStream};
use crate::stream::{self, Emitter};
use crate::vendor::{TextRequest, VendorClient, VendorConnector};

/// Temperature sent when the config does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Token limit sent when the config does not set one. A configured `0` sends none.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Token channel capacity when the config does not set one.
pub const DEFAULT_STREAM_BUFFER: usize = 1;

#[derive(Clone)]
struct VendorHandle {
    client: Arc<dyn VendorClient>,
    capabilities: Capabilities,
}

/// A provider instance for one built-in family: one config, one lazily built vendor client.
pub struct ProviderAdapter {
    profile: &'static ProviderProfile,
    env_name: Option<String>,
    config: ProviderConfig,
    connector: Arc<dyn VendorConnector>,
    vendor: OnceCell<VendorHandle>,
}

impl ProviderAdapter {
    pub fn new(
        profile: &'static ProviderProfile,
        env_name: Option<String>,
        config: ProviderConfig,
        connector: Arc<dyn VendorConnector>,
    ) -> Self {
        Self {
            profile,
            env_name,
            config,
            connector,
            vendor: OnceCell::new(),
        }
    }

    pub fn profile(&self) -> &'static ProviderProfile {
        self.profile
    }

    /// Whether the vendor client has been built.
    pub fn is_initialized(&self) -> bool {
        self.vendor.initialized()
    }

    /// Resolve defaults and place the system prompt the way this family expects.
    pub fn text_request(&self, prompt: &str, system_prompt: Option<&str>) -> TextRequest {
        let params = &self.config.additional_params;
        let model = params
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.profile.default_model.to_string());
        let max_tokens = match params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS) {
            0 => None,
            n => Some(n),
        };

        let (system, messages) = match system_prompt.filter(|s| !s.is_empty()) {
            None => (None, None),
            Some(s) => match self.profile.system_prompt {
                SystemPromptStyle::Dedicated => (Some(s.to_string()), None),
                SystemPromptStyle::MessageList => (
                    None,
                    Some(vec![ChatMessage::system(s), ChatMessage::user(prompt)]),
                ),
            },
        };

        TextRequest {
            prompt: prompt.to_string(),
            model,
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens,
            system,
            messages,
        }
    }

    fn hint(&self) -> String {
        format!(
            "Set SEKVO_ENV like 'export SEKVO_ENV={}-dev' or set {}",
            self.profile.name,
            self.profile.credential.fallback_env_var(self.profile.name)
        )
    }

    fn missing_credential(&self) -> SekvoError {
        let message = match self.profile.credential {
            CredentialField::HostUrl => {
                format!("Missing required {} host URL", self.profile.display_name)
            }
            CredentialField::ProfileName => "Missing required AWS profile name".to_string(),
            CredentialField::ApiKey => {
                format!("Missing required {} API key", self.profile.display_name)
            }
        };
        SekvoError::configuration(message, self.hint())
    }

    async fn vendor(&self) -> Result<&VendorHandle> {
        self.vendor
            .get_or_try_init(|| async {
                let credential = self
                    .config
                    .credential(self.profile.credential)
                    .ok_or_else(|| self.missing_credential())?;
                let client = self
                    .connector
                    .connect(self.profile, credential)
                    .await
                    .map_err(|e| SekvoError::generation(self.profile.name, e))?;
                let capabilities = client.capabilities();
                info!(
                    provider = self.profile.name,
                    env = self.env_name.as_deref().unwrap_or("-"),
                    streaming = capabilities.streaming,
                    structured = capabilities.structured_responses,
                    "vendor client initialized"
                );
                Ok::<_, SekvoError>(VendorHandle {
                    client,
                    capabilities,
                })
            })
            .await
    }

    fn stream_buffer(&self) -> usize {
        self.config.stream_buffer.unwrap_or(DEFAULT_STREAM_BUFFER)
    }
}

#[async_trait]
impl BaseProvider for ProviderAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn env_name(&self) -> Option<&str> {
        self.env_name.as_deref()
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let Some(value) = self.config.credential(self.profile.credential) else {
            return Err(self.missing_credential());
        };
        if self.profile.credential == CredentialField::HostUrl {
            url::Url::parse(value).map_err(|e| {
                SekvoError::configuration(
                    format!(
                        "Invalid {} host URL '{}': {}",
                        self.profile.display_name, value, e
                    ),
                    self.hint(),
                )
            })?;
        }
        Ok(())
    }

    async fn initialize(&self) -> Result<Capabilities> {
        Ok(self.vendor().await?.capabilities)
    }

    fn capabilities(&self) -> Capabilities {
        match self.vendor.get() {
            Some(handle) => handle.capabilities,
            None => Capabilities {
                streaming: self.profile.streaming_hint,
                structured_responses: false,
            },
        }
    }

    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let vendor = self.vendor().await?;
        let request = self.text_request(prompt, system_prompt);
        debug!(provider = self.profile.name, model = %request.model, "generating text");
        vendor
            .client
            .generate_text(&request)
            .await
            .map_err(|e| SekvoError::generation(self.profile.name, e))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<TokenStream> {
        let request = self.text_request(prompt, system_prompt);
        let (emitter, tokens) = Emitter::channel(
            self.profile.name,
            self.config.stream_errors,
            self.stream_buffer(),
        );

        let vendor = match self.vendor().await {
            Ok(vendor) => vendor,
            Err(e @ SekvoError::Configuration { .. }) => return Err(e),
            Err(e) => {
                emitter.fail_now(e.to_string());
                return Ok(tokens);
            }
        };

        let client = Arc::clone(&vendor.client);
        if vendor.capabilities.streaming && client.as_streaming().is_some() {
            debug!(provider = self.profile.name, model = %request.model, "streaming tokens");
            stream::spawn_streaming(client, request, emitter);
        } else {
            debug!(
                provider = self.profile.name,
                model = %request.model,
                "no token stream, falling back to a single generation"
            );
            stream::spawn_fallback(client, request, emitter);
        }
        Ok(tokens)
    }

    async fn structured_response(&self, prompt: &str, schema: &ResponseSchema) -> Result<Value> {
        let vendor = self.vendor().await?;
        let structured = vendor
            .client
            .as_structured()
            .filter(|_| vendor.capabilities.structured_responses)
            .ok_or_else(|| SekvoError::unsupported(self.profile.name, "structured responses"))?;

        let request = self.text_request(prompt, None);
        debug!(
            provider = self.profile.name,
            model = %request.model,
            schema = %schema.name,
            "requesting structured response"
        );
        let value = structured
            .structured(&request, schema)
            .await
            .map_err(|e| SekvoError::generation(self.profile.name, e))?;
        schema.validate(&value)?;
        Ok(value)
    }

    async fn make_tools(&self, tools: &[Tool]) -> Result<Vec<Value>> {
        let vendor = self.vendor().await?;
        let tooling = vendor
            .client
            .as_tooling()
            .ok_or_else(|| SekvoError::unsupported(self.profile.name, "tools"))?;
        tooling
            .make_tools(tools)
            .map_err(|e| SekvoError::generation(self.profile.name, e))
    }
}

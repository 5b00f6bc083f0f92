use serde::{Deserialize, Serialize};

/// Environment variable that selects the active config environment,
/// e.g. `export SEKVO_ENV=anthropic-dev`.
pub const SEKVO_ENV_KEY: &str = "SEKVO_ENV";

/// Environment variable that points at an explicit `sekvo.toml`.
pub const SEKVO_CONFIG_KEY: &str = "SEKVO_CONFIG";

/// Name of a registered provider, e.g. "anthropic".
pub type ProviderName = String;

/// Configuration for one provider instance, read from one environment of
/// `sekvo.toml`. Owned by exactly one provider instance and never rewritten.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for hosted providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of a local inference server (Ollama).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_url: Option<String>,
    /// AWS profile used to sign Bedrock requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    /// Generation parameters: model, temperature, max tokens.
    pub additional_params: AdditionalParams,
    /// What a stream consumer sees when the vendor fails mid-stream.
    pub stream_errors: StreamErrorMode,
    /// Capacity of the token channel between producer and consumer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_buffer: Option<usize>,
}

/// Optional generation overrides. Unset fields fall back to per-provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `0` disables the limit entirely; the parameter is then not sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// How streaming failures reach the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamErrorMode {
    /// The failure arrives as one final text token prefixed with
    /// `"Error in streaming: "`. Consumers that only render text never fail.
    #[default]
    Sentinel,
    /// The failure arrives as one final typed `Err`.
    Strict,
}

/// Which credential a provider family needs before its vendor client can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialField {
    ApiKey,
    HostUrl,
    ProfileName,
}

impl CredentialField {
    /// Config key as written in `sekvo.toml`.
    pub fn key(&self) -> &'static str {
        match self {
            CredentialField::ApiKey => "api_key",
            CredentialField::HostUrl => "host_url",
            CredentialField::ProfileName => "profile_name",
        }
    }

    /// Environment variable consulted when the config file leaves the field unset,
    /// e.g. `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, `AWS_PROFILE`.
    pub fn fallback_env_var(&self, provider: &str) -> String {
        match self {
            CredentialField::ApiKey => format!("{}_API_KEY", provider.to_uppercase()),
            CredentialField::HostUrl => format!("{}_HOST", provider.to_uppercase()),
            CredentialField::ProfileName => "AWS_PROFILE".into(),
        }
    }
}

impl ProviderConfig {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn with_host_url(url: impl Into<String>) -> Self {
        Self {
            host_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_profile_name(profile: impl Into<String>) -> Self {
        Self {
            profile_name: Some(profile.into()),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.additional_params.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.additional_params.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.additional_params.max_tokens = Some(max_tokens);
        self
    }

    pub fn stream_errors(mut self, mode: StreamErrorMode) -> Self {
        self.stream_errors = mode;
        self
    }

    /// The value of one credential field, ignoring blank strings.
    pub fn credential(&self, field: CredentialField) -> Option<&str> {
        let value = match field {
            CredentialField::ApiKey => self.api_key.as_deref(),
            CredentialField::HostUrl => self.host_url.as_deref(),
            CredentialField::ProfileName => self.profile_name.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn set_credential(&mut self, field: CredentialField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            CredentialField::ApiKey => self.api_key = value,
            CredentialField::HostUrl => self.host_url = value,
            CredentialField::ProfileName => self.profile_name = value,
        }
    }

    /// Copy with the API key replaced by a short masked form, for display.
    pub fn masked(&self) -> Self {
        Self {
            api_key: self.api_key.as_deref().map(mask_secret),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("host_url", &self.host_url)
            .field("profile_name", &self.profile_name)
            .field("additional_params", &self.additional_params)
            .field("stream_errors", &self.stream_errors)
            .field("stream_buffer", &self.stream_buffer)
            .finish()
    }
}

/// Keep the first four characters of a secret, hide the rest.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".into()
    } else {
        format!("{visible}****")
    }
}

use sekvo_core::CredentialField;
use serde::Serialize;

/// How a provider family wants the system prompt delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPromptStyle {
    /// A dedicated request parameter (Anthropic's top-level `system`).
    Dedicated,
    /// A leading `system` message followed by the user message.
    MessageList,
}

/// Static facts about one built-in provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderProfile {
    /// Registry name, e.g. "anthropic".
    pub name: &'static str,
    /// Name used in messages and panel titles, e.g. "Anthropic".
    pub display_name: &'static str,
    pub default_model: &'static str,
    /// The one credential field the vendor client is built from.
    pub credential: CredentialField,
    pub system_prompt: SystemPromptStyle,
    /// Streaming flag reported before the vendor client exists.
    pub streaming_hint: bool,
}

const fn hosted(
    name: &'static str,
    display_name: &'static str,
    default_model: &'static str,
) -> ProviderProfile {
    ProviderProfile {
        name,
        display_name,
        default_model,
        credential: CredentialField::ApiKey,
        system_prompt: SystemPromptStyle::MessageList,
        streaming_hint: false,
    }
}

/// The eight built-in provider families.
pub static PROFILES: [ProviderProfile; 8] = [
    ProviderProfile {
        name: "anthropic",
        display_name: "Anthropic",
        default_model: "claude-3-opus-20240229",
        credential: CredentialField::ApiKey,
        system_prompt: SystemPromptStyle::Dedicated,
        streaming_hint: true,
    },
    hosted("openai", "OpenAI", "gpt-4-turbo-preview"),
    hosted("groq", "Groq", "llama3-8b-8192"),
    hosted("gemini", "Gemini", "gemini-1.5-flash-latest"),
    ProviderProfile {
        name: "ollama",
        display_name: "Ollama",
        default_model: "llama3.2",
        credential: CredentialField::HostUrl,
        system_prompt: SystemPromptStyle::MessageList,
        streaming_hint: false,
    },
    hosted("xai", "xAI", "grok-beta"),
    ProviderProfile {
        name: "amazon",
        display_name: "Amazon",
        default_model: "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
        credential: CredentialField::ProfileName,
        system_prompt: SystemPromptStyle::MessageList,
        streaming_hint: false,
    },
    hosted("deepseek", "Deepseek", "deepseek-chat"),
];

/// Look up a built-in profile by (case-insensitive) name.
pub fn profile(name: &str) -> Option<&'static ProviderProfile> {
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

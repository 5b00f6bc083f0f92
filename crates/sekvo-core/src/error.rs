use thiserror::Error;

/// Unified error type for sekvo.
#[derive(Error, Debug)]
pub enum SekvoError {
    // ── Registry errors ────────────────────────────────────────
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    // ── Provider errors ────────────────────────────────────────
    /// A required credential or config field is missing. Raised before any
    /// network call; `hint` tells the user what to set.
    #[error("{message}. {hint}")]
    Configuration { message: String, hint: String },

    #[error("provider {provider} does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        capability: String,
    },

    #[error("generation failed ({provider}): {source}")]
    Generation {
        provider: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("streaming failed ({provider}): {message}")]
    Stream { provider: String, message: String },

    #[error("structured response does not match schema: {0}")]
    SchemaValidation(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── CLI errors ─────────────────────────────────────────────
    #[error("{0}")]
    Usage(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SekvoError {
    /// Shorthand for a [`SekvoError::Configuration`].
    pub fn configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Shorthand for a [`SekvoError::UnsupportedCapability`].
    pub fn unsupported(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// Wrap a vendor-side failure of a non-streaming call.
    pub fn generation<E>(provider: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Generation {
            provider: provider.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, SekvoError>;

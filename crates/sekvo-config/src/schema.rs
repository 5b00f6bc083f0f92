use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use sekvo_core::{ProviderConfig, SEKVO_ENV_KEY};

/// Root configuration — maps to `sekvo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SekvoConfig {
    /// Environment used when neither `--env` nor `SEKVO_ENV` is given.
    pub default_env: Option<String>,
    pub logging: LoggingConfig,
    /// Named environments, e.g. `[environments.anthropic-dev]`.
    pub environments: BTreeMap<String, ProviderConfig>,
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
    /// Log file path (None = stderr only).
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "pretty".into(),
            file: None,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SekvoConfig {
    /// Look up an environment by name.
    pub fn environment(&self, name: &str) -> Option<&ProviderConfig> {
        self.environments.get(name)
    }

    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Default environment ───
        if let Some(ref env) = self.default_env
            && !self.environments.contains_key(env)
        {
            warnings.push(ConfigWarning {
                field: "default_env".into(),
                message: format!("environment '{}' is not defined", env),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Add an [environments.{}] table", env)),
            });
        }

        if self.environments.is_empty() {
            warnings.push(ConfigWarning {
                field: "environments".into(),
                message: "no environments configured".into(),
                severity: WarningSeverity::Info,
                hint: Some(format!(
                    "Credentials will come from provider env vars; define [environments.<name>] and set {}",
                    SEKVO_ENV_KEY
                )),
            });
        }

        for (name, env) in &self.environments {
            let params = &env.additional_params;

            // ── Temperature ───
            if let Some(t) = params.temperature
                && !(0.0..=2.0).contains(&t)
            {
                warnings.push(ConfigWarning {
                    field: format!("environments.{}.additional_params.temperature", name),
                    message: format!("temperature {} is out of range", t),
                    severity: WarningSeverity::Error,
                    hint: Some("Temperature must be between 0.0 and 2.0".into()),
                });
            }

            // ── Model ───
            if let Some(ref model) = params.model
                && model.trim().is_empty()
            {
                warnings.push(ConfigWarning {
                    field: format!("environments.{}.additional_params.model", name),
                    message: "model is empty".into(),
                    severity: WarningSeverity::Warning,
                    hint: Some("Remove the key to use the provider's default model".into()),
                });
            }

            // ── Stream buffer ───
            if env.stream_buffer == Some(0) {
                warnings.push(ConfigWarning {
                    field: format!("environments.{}.stream_buffer", name),
                    message: "stream_buffer is 0".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Use 1 or more; 1 keeps a single token in flight".into()),
                });
            }

            // ── No credential at all ───
            if env.api_key.is_none() && env.host_url.is_none() && env.profile_name.is_none() {
                warnings.push(ConfigWarning {
                    field: format!("environments.{}", name),
                    message: "no api_key, host_url, or profile_name set".into(),
                    severity: WarningSeverity::Info,
                    hint: Some("Provider env vars (e.g. OPENAI_API_KEY) will be used".into()),
                });
            }
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}

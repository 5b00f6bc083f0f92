use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use sekvo_core::{CredentialField, ProviderConfig, SEKVO_CONFIG_KEY, SEKVO_ENV_KEY};

use crate::schema::SekvoConfig;

/// Loads the sekvo configuration and resolves per-provider settings from it.
pub struct ConfigLoader {
    config: SekvoConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SEKVO_CONFIG env > ~/.sekvo/sekvo.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var(SEKVO_CONFIG_KEY) {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sekvo")
            .join("sekvo.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> sekvo_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            debug!(?config_path, "config file not found, using defaults");
            SekvoConfig::default()
        };

        Self::from_config(config, config_path)
    }

    /// Build a loader around an already-parsed config (used by tests and embedders).
    pub fn from_config(config: SekvoConfig, config_path: PathBuf) -> sekvo_core::Result<Self> {
        let config = Self::apply_env_overrides(config);

        // Validate config — log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    match w.severity {
                        crate::WarningSeverity::Info => debug!("{}", w),
                        _ => warn!("{}", w),
                    }
                }
            }
            Err(e) => {
                return Err(sekvo_core::SekvoError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, config_path: &Path) -> sekvo_core::Result<SekvoConfig> {
        toml::from_str::<SekvoConfig>(raw).map_err(|e| {
            sekvo_core::SekvoError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> &SekvoConfig {
        &self.config
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (SEKVO_LOG_LEVEL).
    fn apply_env_overrides(mut config: SekvoConfig) -> SekvoConfig {
        if let Ok(v) = std::env::var("SEKVO_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }

    /// Name of the active environment: explicit > SEKVO_ENV > default_env.
    pub fn active_env(&self, explicit: Option<&str>) -> Option<String> {
        self.active_env_with(explicit, |k| std::env::var(k).ok())
    }

    fn active_env_with(
        &self,
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| lookup(SEKVO_ENV_KEY))
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.config.default_env.clone())
    }

    /// Resolve the [`ProviderConfig`] one provider instance should receive.
    ///
    /// The named environment's table is used as-is; a missing credential is
    /// filled from the provider's env var (config file wins, env is the fallback).
    /// An unknown environment name yields an otherwise empty config.
    pub fn provider_config(
        &self,
        provider: &str,
        credential: CredentialField,
        env_name: Option<&str>,
    ) -> ProviderConfig {
        self.provider_config_with(provider, credential, env_name, |k| std::env::var(k).ok())
    }

    fn provider_config_with(
        &self,
        provider: &str,
        credential: CredentialField,
        env_name: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ProviderConfig {
        let env = self.active_env_with(env_name, &lookup);
        let mut config = match env.as_deref() {
            Some(name) => match self.config.environment(name) {
                Some(c) => c.clone(),
                None => {
                    warn!(env = name, "environment not found in config");
                    ProviderConfig::default()
                }
            },
            None => ProviderConfig::default(),
        };

        if config.credential(credential).is_none() {
            let var = credential.fallback_env_var(provider);
            if let Some(value) = lookup(&var).filter(|v| !v.trim().is_empty()) {
                debug!(provider, var = %var, "credential taken from environment");
                config.set_credential(credential, value);
            }
        }

        config
    }
}

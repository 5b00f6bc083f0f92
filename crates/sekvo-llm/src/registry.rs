use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use sekvo_core::{ProviderConfig, Result, SekvoError};

use crate::adapter::ProviderAdapter;
use crate::http::HttpConnector;
use crate::profile::{PROFILES, ProviderProfile};
use crate::provider::BaseProvider;
use crate::vendor::VendorConnector;

/// Builds provider instances of one type.
pub trait ProviderFactory: Send + Sync {
    /// Create an instance bound to `config`. Implementations validate the
    /// config here so a bad credential fails before any network call.
    fn create(&self, env_name: Option<&str>, config: ProviderConfig)
    -> Result<Arc<dyn BaseProvider>>;

    /// Static facts about the family, for built-in providers.
    fn profile(&self) -> Option<&'static ProviderProfile> {
        None
    }
}

/// Factory for the built-in families: a [`ProviderAdapter`] over a shared connector.
pub struct AdapterFactory {
    profile: &'static ProviderProfile,
    connector: Arc<dyn VendorConnector>,
}

impl AdapterFactory {
    pub fn new(profile: &'static ProviderProfile, connector: Arc<dyn VendorConnector>) -> Self {
        Self { profile, connector }
    }
}

impl ProviderFactory for AdapterFactory {
    fn create(
        &self,
        env_name: Option<&str>,
        config: ProviderConfig,
    ) -> Result<Arc<dyn BaseProvider>> {
        let adapter = ProviderAdapter::new(
            self.profile,
            env_name.map(str::to_string),
            config,
            Arc::clone(&self.connector),
        );
        adapter.validate_config()?;
        debug!(provider = self.profile.name, env = ?env_name, "provider instance created");
        Ok(Arc::new(adapter))
    }

    fn profile(&self) -> Option<&'static ProviderProfile> {
        Some(self.profile)
    }
}

static GLOBAL: LazyLock<ProviderRegistry> =
    LazyLock::new(|| ProviderRegistry::with_builtin(Arc::new(HttpConnector::new())));

/// Name → provider factory. Names are lowercase; entries are never removed.
pub struct ProviderRegistry {
    providers: RwLock<BTreeMap<String, Arc<dyn ProviderFactory>>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(BTreeMap::new()),
        }
    }

    /// A registry holding the eight built-in providers.
    pub fn with_builtin(connector: Arc<dyn VendorConnector>) -> Self {
        let providers = PROFILES
            .iter()
            .map(|profile| {
                let factory: Arc<dyn ProviderFactory> =
                    Arc::new(AdapterFactory::new(profile, Arc::clone(&connector)));
                (profile.name.to_string(), factory)
            })
            .collect();
        Self {
            providers: RwLock::new(providers),
        }
    }

    /// The process-wide registry, built on first access over real vendor clients.
    pub fn global() -> &'static ProviderRegistry {
        &GLOBAL
    }

    /// Add a provider. Registering a name twice is an error.
    pub fn register(&self, name: &str, factory: Arc<dyn ProviderFactory>) -> Result<()> {
        let key = name.trim().to_lowercase();
        let mut providers = self.providers.write();
        if providers.contains_key(&key) {
            return Err(SekvoError::DuplicateProvider(key));
        }
        info!(provider = %key, "registered provider");
        providers.insert(key, factory);
        Ok(())
    }

    /// Register the built-in providers into an existing registry.
    pub fn register_builtin(&self, connector: Arc<dyn VendorConnector>) -> Result<()> {
        for profile in &PROFILES {
            self.register(
                profile.name,
                Arc::new(AdapterFactory::new(profile, Arc::clone(&connector))),
            )?;
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderFactory>> {
        let key = name.trim().to_lowercase();
        self.providers
            .read()
            .get(&key)
            .cloned()
            .ok_or(SekvoError::UnknownProvider(key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers
            .read()
            .contains_key(&name.trim().to_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// Resolve `name` and create an instance in one step.
    pub fn create(
        &self,
        name: &str,
        env_name: Option<&str>,
        config: ProviderConfig,
    ) -> Result<Arc<dyn BaseProvider>> {
        self.resolve(name)?.create(env_name, config)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

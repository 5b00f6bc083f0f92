#[cfg(test)]
mod tests {
    use sekvo_core::{ProviderConfig, Result, SekvoError};
    use sekvo_llm::mock::{MockConnector, MockVendor};
    use sekvo_llm::registry::{ProviderFactory, ProviderRegistry};
    use sekvo_llm::{BaseProvider, VendorConnector};
    use std::sync::Arc;

    fn registry() -> ProviderRegistry {
        tracked().0
    }

    /// A registry plus a handle on its connector, to count client constructions.
    fn tracked() -> (ProviderRegistry, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::new(Arc::new(MockVendor::new())));
        let registry =
            ProviderRegistry::with_builtin(Arc::clone(&connector) as Arc<dyn VendorConnector>);
        (registry, connector)
    }

    /// A factory that is not backed by a built-in profile.
    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn create(
            &self,
            env_name: Option<&str>,
            config: ProviderConfig,
        ) -> Result<Arc<dyn BaseProvider>> {
            let connector: Arc<dyn VendorConnector> =
                Arc::new(MockConnector::new(Arc::new(MockVendor::new())));
            let profile = sekvo_llm::profile::profile("openai").unwrap();
            Ok(Arc::new(sekvo_llm::ProviderAdapter::new(
                profile,
                env_name.map(str::to_string),
                config,
                connector,
            )))
        }
    }

    // ── Registration / lookup ──────────────────────────────────

    #[test]
    fn test_builtin_names_sorted() {
        assert_eq!(
            registry().names(),
            vec![
                "amazon",
                "anthropic",
                "deepseek",
                "gemini",
                "groq",
                "ollama",
                "openai",
                "xai"
            ]
        );
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let result = registry().resolve("mistral");
        assert!(matches!(result, Err(SekvoError::UnknownProvider(ref n)) if n == "mistral"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = registry();
        let result = registry.register("openai", Arc::new(EchoFactory));
        assert!(matches!(result, Err(SekvoError::DuplicateProvider(_))));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let registry = ProviderRegistry::new();
        registry.register("Echo", Arc::new(EchoFactory)).unwrap();
        assert!(registry.contains("ECHO"));
        assert!(registry.resolve("echo").is_ok());
        assert!(registry.register("echo", Arc::new(EchoFactory)).is_err());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_register_builtin_into_existing_registry() {
        let registry = ProviderRegistry::new();
        registry.register("echo", Arc::new(EchoFactory)).unwrap();
        let connector: Arc<dyn VendorConnector> =
            Arc::new(MockConnector::new(Arc::new(MockVendor::new())));
        registry.register_builtin(Arc::clone(&connector)).unwrap();
        assert_eq!(registry.names().len(), 9);
        assert!(registry.register_builtin(connector).is_err());
    }

    #[test]
    fn test_custom_factory_has_no_profile() {
        let registry = ProviderRegistry::new();
        registry.register("echo", Arc::new(EchoFactory)).unwrap();
        assert!(registry.resolve("echo").unwrap().profile().is_none());
        let builtin = self::registry().resolve("gemini").unwrap();
        assert_eq!(builtin.profile().unwrap().default_model, "gemini-1.5-flash-latest");
    }

    #[test]
    fn test_global_registry_has_builtin_providers() {
        let global = ProviderRegistry::global();
        assert!(global.contains("anthropic"));
        assert!(global.contains("deepseek"));
    }

    // ── Config validation on create ────────────────────────────

    #[test]
    fn test_missing_api_key_fails_fast() {
        let (registry, connector) = tracked();
        let err = registry
            .create("anthropic", None, ProviderConfig::default())
            .err()
            .unwrap();
        match err {
            SekvoError::Configuration { message, hint } => {
                assert_eq!(message, "Missing required Anthropic API key");
                assert!(hint.contains("export SEKVO_ENV=anthropic-dev"));
                assert!(hint.contains("ANTHROPIC_API_KEY"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_missing_ollama_host_fails_fast() {
        let (registry, connector) = tracked();
        let err = registry
            .create("ollama", None, ProviderConfig::with_api_key("unused"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Missing required Ollama host URL"));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_invalid_ollama_host_fails_fast() {
        let (registry, connector) = tracked();
        let err = registry
            .create("ollama", None, ProviderConfig::with_host_url("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, SekvoError::Configuration { .. }));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_missing_aws_profile_fails_fast() {
        let (registry, connector) = tracked();
        let err = registry
            .create("amazon", None, ProviderConfig::with_api_key("unused"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Missing required AWS profile name"));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_create_with_valid_credentials() {
        let registry = registry();
        let provider = registry
            .create(
                "ollama",
                Some("ollama-dev"),
                ProviderConfig::with_host_url("http://127.0.0.1:11434"),
            )
            .unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.env_name(), Some("ollama-dev"));
        assert!(
            registry
                .create("amazon", None, ProviderConfig::with_profile_name("bedrock"))
                .is_ok()
        );
    }
}

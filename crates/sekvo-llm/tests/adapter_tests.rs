#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    use sekvo_core::{ChatMessage, ProviderConfig, SekvoError, Tool};
    use sekvo_llm::mock::{MockConnector, MockVendor};
    use sekvo_llm::{
        BaseProvider, Capabilities, ProviderAdapter, ProviderRegistry, ResponseSchema,
        VendorConnector, structured_response_as,
    };

    fn setup(
        name: &str,
        config: ProviderConfig,
        vendor: MockVendor,
    ) -> (Arc<dyn BaseProvider>, Arc<MockConnector>) {
        setup_with(name, config, MockConnector::new(Arc::new(vendor)))
    }

    fn setup_with(
        name: &str,
        config: ProviderConfig,
        connector: MockConnector,
    ) -> (Arc<dyn BaseProvider>, Arc<MockConnector>) {
        let connector = Arc::new(connector);
        let registry =
            ProviderRegistry::with_builtin(Arc::clone(&connector) as Arc<dyn VendorConnector>);
        let provider = registry.create(name, None, config).unwrap();
        (provider, connector)
    }

    fn person_schema() -> ResponseSchema {
        ResponseSchema::new(
            "person",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "age": { "type": "integer" }
                },
                "required": ["name", "age"]
            }),
        )
    }

    // ── Lazy initialization ────────────────────────────────────

    #[tokio::test]
    async fn test_client_built_on_first_use_only() {
        let vendor = MockVendor::new().with_response("one").with_response("two");
        let (provider, connector) = setup("openai", ProviderConfig::with_api_key("sk-1"), vendor);
        assert_eq!(connector.connect_count(), 0);

        assert_eq!(provider.generate("hi", None).await.unwrap(), "one");
        assert_eq!(provider.generate("hi", None).await.unwrap(), "two");
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connector_receives_family_credential() {
        let (ollama, c1) = setup(
            "ollama",
            ProviderConfig::with_host_url("http://127.0.0.1:11434"),
            MockVendor::new(),
        );
        ollama.initialize().await.unwrap();
        assert_eq!(c1.credentials(), vec!["http://127.0.0.1:11434"]);

        let (amazon, c2) = setup(
            "amazon",
            ProviderConfig::with_profile_name("bedrock-dev"),
            MockVendor::new(),
        );
        amazon.initialize().await.unwrap();
        assert_eq!(c2.credentials(), vec!["bedrock-dev"]);

        let (anthropic, c3) = setup(
            "anthropic",
            ProviderConfig::with_api_key("sk-ant"),
            MockVendor::new(),
        );
        anthropic.initialize().await.unwrap();
        assert_eq!(c3.credentials(), vec!["sk-ant"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_connects_once() {
        let connector = MockConnector::new(Arc::new(MockVendor::new()))
            .with_delay(Duration::from_millis(50));
        let (provider, connector) =
            setup_with("groq", ProviderConfig::with_api_key("gsk"), connector);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provider = Arc::clone(&provider);
            handles.push(tokio::spawn(async move {
                provider.generate("hi", None).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_init_retries_on_next_call() {
        let connector = MockConnector::new(Arc::new(MockVendor::new().with_response("ok"))).failing(1);
        let (provider, connector) =
            setup_with("xai", ProviderConfig::with_api_key("xai-key"), connector);

        let first = provider.generate("hi", None).await;
        assert!(matches!(first, Err(SekvoError::Generation { .. })));
        assert_eq!(provider.generate("hi", None).await.unwrap(), "ok");
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_unvalidated_adapter_stream_aborts_on_missing_credential() {
        let connector = Arc::new(MockConnector::new(Arc::new(MockVendor::new())));
        let profile = sekvo_llm::profile::profile("anthropic").unwrap();
        let adapter = ProviderAdapter::new(
            profile,
            None,
            ProviderConfig::default(),
            Arc::clone(&connector) as Arc<dyn VendorConnector>,
        );

        match adapter.generate_stream("hi", None).await {
            Err(SekvoError::Configuration { message, .. }) => {
                assert_eq!(message, "Missing required Anthropic API key");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    // ── Capabilities ───────────────────────────────────────────

    #[tokio::test]
    async fn test_capabilities_before_and_after_init() {
        let vendor = MockVendor::new().with_capabilities(Capabilities {
            streaming: false,
            structured_responses: true,
        });
        let (anthropic, _) = setup("anthropic", ProviderConfig::with_api_key("k"), vendor);
        assert!(anthropic.supports_streaming());
        assert!(!anthropic.supports_structured_responses());

        let caps = anthropic.initialize().await.unwrap();
        assert!(!caps.streaming);
        assert!(!anthropic.supports_streaming());
        assert!(anthropic.supports_structured_responses());

        let (openai, _) = setup("openai", ProviderConfig::with_api_key("k"), MockVendor::new());
        assert!(!openai.supports_streaming());
    }

    // ── Request translation ────────────────────────────────────

    #[tokio::test]
    async fn test_anthropic_gets_dedicated_system_prompt() {
        let vendor = Arc::new(MockVendor::new().with_response("ok"));
        let (provider, _) = setup_with(
            "anthropic",
            ProviderConfig::with_api_key("k"),
            MockConnector::new(Arc::clone(&vendor)),
        );
        provider.generate("Hello", Some("Be brief")).await.unwrap();

        let req = &vendor.recorded_requests()[0];
        assert_eq!(req.system.as_deref(), Some("Be brief"));
        assert!(req.messages.is_none());
        assert_eq!(req.prompt, "Hello");
        assert_eq!(req.model, "claude-3-opus-20240229");
        assert_eq!(req.temperature, 0.7);
        assert_eq!(req.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_other_providers_get_message_list() {
        let vendor = Arc::new(MockVendor::new().with_response("ok"));
        let (provider, _) = setup_with(
            "deepseek",
            ProviderConfig::with_api_key("k"),
            MockConnector::new(Arc::clone(&vendor)),
        );
        provider.generate("Hello", Some("Be brief")).await.unwrap();

        let req = &vendor.recorded_requests()[0];
        assert!(req.system.is_none());
        assert_eq!(
            req.messages.as_deref(),
            Some(&[ChatMessage::system("Be brief"), ChatMessage::user("Hello")][..])
        );
        assert_eq!(req.model, "deepseek-chat");
    }

    #[tokio::test]
    async fn test_no_system_prompt_sends_neither() {
        let vendor = Arc::new(MockVendor::new().with_response("ok"));
        let (provider, _) = setup_with(
            "gemini",
            ProviderConfig::with_api_key("k"),
            MockConnector::new(Arc::clone(&vendor)),
        );
        provider.generate("Hello", None).await.unwrap();
        let req = &vendor.recorded_requests()[0];
        assert!(req.system.is_none());
        assert!(req.messages.is_none());
    }

    #[tokio::test]
    async fn test_additional_params_override_defaults() {
        let vendor = Arc::new(MockVendor::new().with_response("ok"));
        let config = ProviderConfig::with_api_key("k")
            .model("gpt-4o-mini")
            .temperature(0.1)
            .max_tokens(0);
        let (provider, _) =
            setup_with("openai", config, MockConnector::new(Arc::clone(&vendor)));
        provider.generate("Hello", None).await.unwrap();

        let req = &vendor.recorded_requests()[0];
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.temperature, 0.1);
        assert_eq!(req.max_tokens, None);
    }

    #[tokio::test]
    async fn test_same_arguments_same_text() {
        let vendor = Arc::new(MockVendor::new().with_default_response("steady answer"));
        let (provider, _) = setup_with(
            "anthropic",
            ProviderConfig::with_api_key("k"),
            MockConnector::new(Arc::clone(&vendor)),
        );

        let first = provider.generate("Hello", Some("Be brief")).await.unwrap();
        let second = provider.generate("Hello", Some("Be brief")).await.unwrap();
        assert_eq!(first, second);

        let requests = vendor.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    // ── Generation errors ──────────────────────────────────────

    #[tokio::test]
    async fn test_vendor_failure_becomes_generation_error() {
        let vendor = MockVendor::new().with_error("HTTP 500: upstream");
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), vendor);
        let err = provider.generate("hi", None).await.unwrap_err();
        match err {
            SekvoError::Generation { provider, source } => {
                assert_eq!(provider, "openai");
                assert!(source.to_string().contains("upstream"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // ── Structured responses ───────────────────────────────────

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    #[tokio::test]
    async fn test_structured_response_decodes() {
        let vendor = MockVendor::new().with_structured(json!({"name": "Ada", "age": 36}));
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), vendor);
        let person: Person = structured_response_as(provider.as_ref(), "who?", &person_schema())
            .await
            .unwrap();
        assert_eq!(
            person,
            Person {
                name: "Ada".into(),
                age: 36
            }
        );
    }

    #[tokio::test]
    async fn test_structured_response_passes_resolved_model() {
        let vendor = Arc::new(MockVendor::new().with_structured(json!({"name": "Ada", "age": 36})));
        let (provider, _) = setup_with(
            "groq",
            ProviderConfig::with_api_key("k"),
            MockConnector::new(Arc::clone(&vendor)),
        );
        provider
            .structured_response("who?", &person_schema())
            .await
            .unwrap();
        assert_eq!(vendor.recorded_requests()[0].model, "llama3-8b-8192");
    }

    #[tokio::test]
    async fn test_structured_response_validated_against_schema() {
        let vendor = MockVendor::new().with_structured(json!({"name": "Ada"}));
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), vendor);
        let err = provider
            .structured_response("who?", &person_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, SekvoError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_structured_response_gated_on_capability() {
        let vendor = MockVendor::new().with_capabilities(Capabilities {
            streaming: true,
            structured_responses: false,
        });
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), vendor);
        let err = provider
            .structured_response("who?", &person_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, SekvoError::UnsupportedCapability { .. }));
    }

    #[tokio::test]
    async fn test_structured_response_needs_vendor_method() {
        let vendor = MockVendor::new().without_structured();
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), vendor);
        let err = provider
            .structured_response("who?", &person_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, SekvoError::UnsupportedCapability { .. }));
    }

    // ── Tools ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_make_tools_delegates_to_vendor() {
        let (provider, _) = setup("openai", ProviderConfig::with_api_key("k"), MockVendor::new());
        let tools = provider
            .make_tools(&[Tool::new("lookup", "Look it up", json!({"type": "object"}))])
            .await
            .unwrap();
        assert_eq!(tools[0]["mock_tool"], "lookup");
    }

    #[tokio::test]
    async fn test_make_tools_unsupported_without_vendor_support() {
        let vendor = MockVendor::new().without_tools();
        let (provider, _) = setup("amazon", ProviderConfig::with_profile_name("p"), vendor);
        let err = provider.make_tools(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), "provider amazon does not support tools");
    }
}

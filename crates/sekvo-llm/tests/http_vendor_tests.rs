#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use sekvo_core::{ProviderConfig, SekvoError, Tool};
    use sekvo_llm::{BaseProvider, HttpConnector, ProviderRegistry, ResponseSchema, STREAM_ERROR_PREFIX};

    fn provider(name: &str, server: &MockServer, config: ProviderConfig) -> Arc<dyn BaseProvider> {
        let connector = HttpConnector::new().with_base_url(name, server.uri());
        ProviderRegistry::with_builtin(Arc::new(connector))
            .create(name, None, config)
            .unwrap()
    }

    fn sse(events: &[serde_json::Value]) -> String {
        let mut body = String::new();
        for e in events {
            body.push_str(&format!("data: {e}\n\n"));
        }
        body
    }

    // ── OpenAI-compatible ──────────────────────────────────────

    #[tokio::test]
    async fn test_openai_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo-preview",
                "max_tokens": 1000,
                "messages": [
                    {"role": "system", "content": "Be brief"},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .mount(&server)
            .await;

        let p = provider("openai", &server, ProviderConfig::with_api_key("sk-test"));
        assert_eq!(p.generate("Hello", Some("Be brief")).await.unwrap(), "Hi there");
    }

    #[tokio::test]
    async fn test_groq_stream_sse() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: [DONE]\n\n",
            sse(&[
                json!({"choices": [{"delta": {"role": "assistant"}}]}),
                json!({"choices": [{"delta": {"content": "Hel"}}]}),
                json!({"choices": [{"delta": {"content": "lo"}}]}),
            ])
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let p = provider("groq", &server, ProviderConfig::with_api_key("gsk"));
        let text = p.generate_stream("Hello", None).await.unwrap().collect_text().await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_rate_limit_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let p = provider("xai", &server, ProviderConfig::with_api_key("xai"));
        let err = p.generate("Hello", None).await.unwrap_err();
        assert!(matches!(err, SekvoError::Generation { .. }));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_http_error_in_stream_becomes_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let p = provider("deepseek", &server, ProviderConfig::with_api_key("ds"));
        let text = p.generate_stream("Hello", None).await.unwrap().collect_text().await.unwrap();
        assert!(text.starts_with(STREAM_ERROR_PREFIX));
        assert!(text.contains("upstream down"));
    }

    #[tokio::test]
    async fn test_openai_structured_uses_json_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"response_format": {"type": "json_schema"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"city\": \"Oslo\"}"}}]
            })))
            .mount(&server)
            .await;

        let p = provider("openai", &server, ProviderConfig::with_api_key("sk"));
        let schema = ResponseSchema::new(
            "place",
            json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
        );
        let value = p.structured_response("Where?", &schema).await.unwrap();
        assert_eq!(value["city"], "Oslo");
    }

    // ── Anthropic ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_anthropic_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(body_partial_json(json!({"system": "Be brief", "model": "claude-3-opus-20240229"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Hi"}, {"type": "text", "text": "!"}]
            })))
            .mount(&server)
            .await;

        let p = provider("anthropic", &server, ProviderConfig::with_api_key("sk-ant"));
        assert_eq!(p.generate("Hello", Some("Be brief")).await.unwrap(), "Hi!");
    }

    #[tokio::test]
    async fn test_anthropic_stream_sse() {
        let server = MockServer::start().await;
        let mut body = String::new();
        body.push_str("event: message_start\n");
        body.push_str(&sse(&[json!({"type": "message_start", "message": {}})]));
        body.push_str(&sse(&[
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Hel"}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "lo"}}),
            json!({"type": "message_stop"}),
        ]));
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let p = provider("anthropic", &server, ProviderConfig::with_api_key("sk-ant"));
        let text = p.generate_stream("Hello", None).await.unwrap().collect_text().await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_anthropic_structured_forces_tool_use() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({"tool_choice": {"type": "tool", "name": "place"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "tool_use", "name": "place", "input": {"city": "Oslo"}}]
            })))
            .mount(&server)
            .await;

        let p = provider("anthropic", &server, ProviderConfig::with_api_key("sk-ant"));
        let schema = ResponseSchema::new("place", json!({"type": "object"}));
        let value = p.structured_response("Where?", &schema).await.unwrap();
        assert_eq!(value, json!({"city": "Oslo"}));
    }

    // ── Gemini ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_gemini_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash-latest:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Bonjour"}]}}]
            })))
            .mount(&server)
            .await;

        let p = provider("gemini", &server, ProviderConfig::with_api_key("g-key"));
        assert_eq!(p.generate("Hello", None).await.unwrap(), "Bonjour");
    }

    #[tokio::test]
    async fn test_gemini_stream_sse() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"candidates": [{"content": {"parts": [{"text": "Bon"}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": "jour"}]}}]}),
        ]);
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash-latest:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let p = provider("gemini", &server, ProviderConfig::with_api_key("g-key"));
        let text = p.generate_stream("Hello", None).await.unwrap().collect_text().await.unwrap();
        assert_eq!(text, "Bonjour");
    }

    #[tokio::test]
    async fn test_gemini_tools_shape() {
        let server = MockServer::start().await;
        let p = provider("gemini", &server, ProviderConfig::with_api_key("g-key"));
        let tools = p
            .make_tools(&[Tool::new("lookup", "Look it up", json!({"type": "object"}))])
            .await
            .unwrap();
        assert_eq!(tools[0]["functionDeclarations"][0]["name"], "lookup");
    }

    // ── Ollama ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_ollama_generate_uses_host_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "local reply"},
                "done": true
            })))
            .mount(&server)
            .await;

        let connector = HttpConnector::new();
        let p = ProviderRegistry::with_builtin(Arc::new(connector))
            .create("ollama", None, ProviderConfig::with_host_url(server.uri()))
            .unwrap();
        assert_eq!(p.generate("Hello", None).await.unwrap(), "local reply");
    }

    #[tokio::test]
    async fn test_ollama_stream_ndjson() {
        let server = MockServer::start().await;
        let body = [
            json!({"message": {"content": "lo"}, "done": false}),
            json!({"message": {"content": "cal"}, "done": false}),
            json!({"message": {"content": ""}, "done": true}),
        ]
        .iter()
        .map(|v| format!("{v}\n"))
        .collect::<String>();
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let p = ProviderRegistry::with_builtin(Arc::new(HttpConnector::new()))
            .create("ollama", None, ProviderConfig::with_host_url(server.uri()))
            .unwrap();
        let text = p.generate_stream("Hello", None).await.unwrap().collect_text().await.unwrap();
        assert_eq!(text, "local");
    }
}

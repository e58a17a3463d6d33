//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` for the OpenAI chat completions API and
//! compatible services such as Groq.

use std::time::Duration;

use async_trait::async_trait;
use cloud_agent_core::{
    AgentError, LlmProvider, Message, Result, ToolCallResult, ToolDescriptor,
};
use reqwest::Client;
use serde_json::{Value, json};

use crate::wire::{self, ArgumentEncoding};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible provider configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: 120,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// OpenAI-compatible LLM provider
///
/// Tool results are correlated by the originating call identifier.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    name: String,
}

impl OpenAiProvider {
    /// Create from configuration
    ///
    /// # Errors
    ///
    /// `Config` when the HTTP client cannot be built.
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            name: "openai".into(),
        })
    }

    /// Label used in logs (e.g. `groq` for the Groq endpoint)
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn log_usage(&self, response: &Value) {
        let usage = &response["usage"];
        tracing::debug!(
            provider = %self.name,
            prompt_tokens = usage["prompt_tokens"].as_u64(),
            completion_tokens = usage["completion_tokens"].as_u64(),
            total_tokens = usage["total_tokens"].as_u64(),
            "Token usage"
        );
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Message> {
        let mut payload = json!({
            "model": model,
            "messages": wire::messages_to_wire(messages, ArgumentEncoding::Text),
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(wire::tools_to_wire(tools));
        }

        let request = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&payload);
        let response = wire::send_json(request).await?;

        self.log_usage(&response);

        let reply = response
            .pointer("/choices/0/message")
            .ok_or_else(|| AgentError::Parse("response has no choices".into()))?;
        wire::response_to_message(reply)
    }

    fn format_tool_result(&self, result: &ToolCallResult) -> Message {
        Message::tool(result.result.clone()).with_tool_call_id(result.tool_call_id.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.config.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                tracing::warn!(provider = %self.name, status = %response.status(), "Health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(provider = %self.name, "Health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_agent_core::{ParameterSchema, ToolArguments};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response: ResponseTemplate) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        let config = OpenAiConfig::new(format!("{}/v1", mock_server.uri()), "test-key");
        let provider = OpenAiProvider::from_config(config).unwrap();
        (mock_server, provider)
    }

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "run_python_code".into(),
            description: "Run code".into(),
            parameters: vec![ParameterSchema::string("command", "Code").required()],
        }
    }

    #[tokio::test]
    async fn test_chat_basic() {
        let body = json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "You have 3 buckets."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18}
        });
        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(body)).await;

        let reply = provider
            .chat("gpt-4o", &[Message::system("sys"), Message::user("Hi")], &[])
            .await
            .unwrap();

        assert_eq!(reply.content, "You have 3 buckets.");
        assert!(!reply.has_tool_calls());
    }

    #[tokio::test]
    async fn test_chat_tool_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "tools": [{"type": "function", "function": {"name": "run_python_code", "strict": true}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_h5d3s25w",
                            "type": "function",
                            "function": {
                                "name": "run_python_code",
                                "arguments": "{\"command\":\"print(1)\",\"modifies_resource\":\"no\"}"
                            }
                        }]
                    }
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            OpenAiProvider::from_config(OpenAiConfig::new(mock_server.uri(), "k")).unwrap();
        let reply = provider
            .chat("gpt-4o", &[Message::user("run it")], &[descriptor()])
            .await
            .unwrap();

        assert_eq!(reply.content, "");
        let call = &reply.tool_calls[0];
        assert_eq!(call.id.as_deref(), Some("call_h5d3s25w"));
        assert_eq!(call.name, "run_python_code");
        assert_eq!(
            call.arguments,
            ToolArguments::Raw("{\"command\":\"print(1)\",\"modifies_resource\":\"no\"}".into())
        );
    }

    #[tokio::test]
    async fn test_tool_result_round_trip() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "user", "content": "run it"},
                    {"role": "assistant", "tool_calls": [{"id": "call_1"}]},
                    {"role": "tool", "content": "1\n", "tool_call_id": "call_1"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "It printed 1."}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            OpenAiProvider::from_config(OpenAiConfig::new(mock_server.uri(), "k")).unwrap();
        let call = cloud_agent_core::ToolCall::new("run_python_code", ToolArguments::Raw("{}".into()))
            .with_id("call_1");
        let result = provider.format_tool_result(&ToolCallResult::for_call(&call, "1\n"));

        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        assert!(result.tool_name.is_none());

        let messages = vec![
            Message::user("run it"),
            Message::assistant("").with_tool_calls(vec![call]),
            result,
        ];
        let reply = provider.chat("gpt-4o", &messages, &[]).await.unwrap();
        assert_eq!(reply.content, "It printed 1.");
    }

    #[tokio::test]
    async fn test_error_status() {
        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(401).set_body_string("invalid api key")).await;

        let err = provider.chat("gpt-4o", &[Message::user("Hi")], &[]).await.unwrap_err();
        match err {
            AgentError::Provider(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_choices() {
        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
                .await;

        let err = provider.chat("gpt-4o", &[Message::user("Hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let config = OpenAiConfig::new("http://127.0.0.1:9", "k");
        let provider = OpenAiProvider::from_config(config).unwrap();

        let err = provider.chat("gpt-4o", &[Message::user("Hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ProviderUnavailable(_)));
        assert!(!provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::from_config(OpenAiConfig::new(mock_server.uri(), "k"))
            .unwrap()
            .named("groq");
        assert_eq!(provider.name(), "groq");
        assert!(provider.health_check().await.unwrap());
    }
}

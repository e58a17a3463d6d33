//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference over its native
//! `/api/chat` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use cloud_agent_core::{
    AgentError, LlmProvider, Message, Result, ToolCallResult, ToolDescriptor,
};
use reqwest::Client;
use serde_json::{Value, json};

use crate::wire::{self, ArgumentEncoding};

pub const OLLAMA_HOST: &str = "http://localhost:11434";

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama base URL including port
    pub host: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.host.trim_end_matches('/'))
    }
}

/// Ollama LLM provider
///
/// Tool results are correlated by tool name; Ollama assigns no call ids.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    ///
    /// # Errors
    ///
    /// `Config` when the HTTP client cannot be built.
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Message> {
        let mut payload = json!({
            "model": model,
            "messages": wire::messages_to_wire(messages, ArgumentEncoding::Object),
            "stream": false,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(wire::tools_to_wire(tools));
        }

        let request = self.client.post(self.config.endpoint("api/chat")).json(&payload);
        let response = wire::send_json(request).await?;

        tracing::debug!(
            provider = "ollama",
            prompt_tokens = response["prompt_eval_count"].as_u64(),
            completion_tokens = response["eval_count"].as_u64(),
            "Token usage"
        );

        let reply = response
            .get("message")
            .ok_or_else(|| AgentError::Parse("response has no message".into()))?;
        wire::response_to_message(reply)
    }

    fn format_tool_result(&self, result: &ToolCallResult) -> Message {
        Message::tool(result.result.clone()).with_tool_name(result.tool_name.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.config.endpoint("api/tags")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_agent_core::{ToolArguments, ToolCall};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OllamaProvider {
        OllamaProvider::from_config(OllamaConfig {
            host: server.uri(),
            ..OllamaConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost:11434");
        assert_eq!(config.endpoint("api/chat"), "http://localhost:11434/api/chat");
    }

    #[tokio::test]
    async fn test_chat_tool_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "llama3.1", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.1",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "function": {
                            "name": "run_python_code",
                            "arguments": {"command": "print(1)", "modifies_resource": "no"}
                        }
                    }]
                },
                "done": true,
                "prompt_eval_count": 40,
                "eval_count": 12
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let reply = provider
            .chat("llama3.1", &[Message::user("run it")], &[])
            .await
            .unwrap();

        let call = &reply.tool_calls[0];
        assert!(call.id.is_none());
        assert_eq!(call.name, "run_python_code");
        assert_eq!(
            call.arguments.decode().unwrap(),
            json!({"command": "print(1)", "modifies_resource": "no"})
        );
    }

    #[tokio::test]
    async fn test_tool_result_round_trip() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "assistant", "tool_calls": [
                        {"function": {"name": "run_python_code", "arguments": {"command": "print(1)"}}}
                    ]},
                    {"role": "tool", "content": "1\n", "tool_name": "run_python_code"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": " It printed 1. "},
                "done": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let call = ToolCall::new(
            "run_python_code",
            ToolArguments::from_value(json!({"command": "print(1)"})),
        );
        let result = provider.format_tool_result(&ToolCallResult::for_call(&call, "1\n"));

        assert_eq!(result.tool_name.as_deref(), Some("run_python_code"));
        assert!(result.tool_call_id.is_none());

        let messages = vec![Message::assistant("").with_tool_calls(vec![call]), result];
        let reply = provider.chat("llama3.1", &messages, &[]).await.unwrap();
        assert_eq!(reply.content, " It printed 1. ");
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model 'x' not found"})),
            )
            .mount(&mock_server)
            .await;

        let err = provider_for(&mock_server)
            .chat("x", &[Message::user("Hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&mock_server)
            .await;

        assert!(provider_for(&mock_server).health_check().await.unwrap());

        let offline = OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1:9".into(),
            ..OllamaConfig::default()
        })
        .unwrap();
        assert!(!offline.health_check().await.unwrap());
    }
}

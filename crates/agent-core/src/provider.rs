//! LLM Provider Strategy Pattern
//!
//! Every backend is reached through `LlmProvider`, which owns its HTTP client
//! and is the only place backend-specific wire fields are produced. The set of
//! backends is closed (`ProviderKind`) and the initialized ones are collected
//! once at startup into a `ProviderCatalog`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloud_agent_core::provider::{LlmProvider, ProviderCatalog, ProviderKind};
//!
//! let mut catalog = ProviderCatalog::new();
//! catalog.insert(ProviderKind::Ollama, Arc::new(OllamaProvider::from_config(config)));
//!
//! let entry = catalog.get("ollama")?;
//! let reply = entry.provider.chat(entry.default_model, &messages, &tools).await?;
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{ToolCallResult, ToolDescriptor};

/// Strategy trait for LLM backends
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend label used in logs
    fn name(&self) -> &str;

    /// Issue one chat request and return the reply in normalized form
    ///
    /// Network and backend failures are returned as-is; there is no retry.
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Message>;

    /// Convert a tool outcome into the message shape this backend expects
    fn format_tool_result(&self, result: &ToolCallResult) -> Message;

    /// Check if the backend is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Known backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
    Groq,
}

impl ProviderKind {
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::Ollama, Self::Groq];

    /// Canonical lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Groq => "groq",
        }
    }

    /// Model selected when switching to this backend
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Ollama => "llama3.1",
            Self::Groq => "llama-3.3-70b-versatile",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or(AgentError::UnsupportedProvider(name))
    }
}

/// An initialized backend and the model it starts with
#[derive(Clone)]
pub struct ProviderEntry {
    pub kind: ProviderKind,
    pub provider: Arc<dyn LlmProvider>,
    pub default_model: String,
}

/// Backends initialized at startup
///
/// Built once and shared by reference; there is no process-wide registry.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    entries: HashMap<ProviderKind, ProviderEntry>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend using its standard default model
    pub fn insert(&mut self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) {
        self.insert_with_model(kind, provider, kind.default_model());
    }

    /// Add a backend with an explicit default model
    pub fn insert_with_model(
        &mut self,
        kind: ProviderKind,
        provider: Arc<dyn LlmProvider>,
        default_model: impl Into<String>,
    ) {
        self.entries.insert(
            kind,
            ProviderEntry {
                kind,
                provider,
                default_model: default_model.into(),
            },
        );
    }

    /// Resolve a backend by name
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` for unknown names, `ProviderNotInitialized` for
    /// known backends that were not set up.
    pub fn get(&self, name: &str) -> Result<&ProviderEntry> {
        let kind: ProviderKind = name.parse()?;
        self.get_kind(kind)
    }

    /// Resolve a backend by kind
    ///
    /// # Errors
    ///
    /// `ProviderNotInitialized` when the backend was not set up.
    pub fn get_kind(&self, kind: ProviderKind) -> Result<&ProviderEntry> {
        self.entries
            .get(&kind)
            .ok_or_else(|| AgentError::ProviderNotInitialized(kind.to_string()))
    }

    /// Initialized backends in declaration order
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.entries.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl LlmProvider for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn chat(
            &self,
            _model: &str,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<Message> {
            Ok(Message::assistant(""))
        }

        fn format_tool_result(&self, result: &ToolCallResult) -> Message {
            Message::tool(result.result.clone())
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" groq ".parse::<ProviderKind>().unwrap(), ProviderKind::Groq);
        assert!(matches!(
            "anthropic".parse::<ProviderKind>(),
            Err(AgentError::UnsupportedProvider(name)) if name == "anthropic"
        ));
    }

    #[test]
    fn test_default_models() {
        assert_eq!(ProviderKind::OpenAi.default_model(), "gpt-4o");
        assert_eq!(ProviderKind::Ollama.default_model(), "llama3.1");
        assert_eq!(ProviderKind::Groq.default_model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = ProviderCatalog::new();
        catalog.insert(ProviderKind::Ollama, Arc::new(Silent));

        let entry = catalog.get("ollama").unwrap();
        assert_eq!(entry.kind, ProviderKind::Ollama);
        assert_eq!(entry.default_model, "llama3.1");

        assert!(matches!(
            catalog.get("openai"),
            Err(AgentError::ProviderNotInitialized(name)) if name == "openai"
        ));
        assert!(matches!(catalog.get("bedrock"), Err(AgentError::UnsupportedProvider(_))));
        assert_eq!(catalog.kinds(), vec![ProviderKind::Ollama]);
    }
}

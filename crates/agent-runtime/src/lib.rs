//! # cloud-agent-runtime
//!
//! Concrete integrations for the cloud-agent system.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference, tool results correlated by name
//! - **OpenAI-compatible**: OpenAI and Groq, tool results correlated by call id
//!
//! ## Tools
//!
//! - **`run_python_code`**: executes Python in a fresh, time- and
//!   memory-bounded interpreter process
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloud_agent_runtime::{RunPythonCode, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_env()?;
//! let agent = Agent::builder(Arc::new(config.build_catalog()?))
//!     .provider(config.provider)
//!     .tool(RunPythonCode::new(config.python.clone()))
//!     .confirmer(Box::new(confirmer))
//!     .build()?;
//! ```

#[cfg(all(feature = "ollama", feature = "openai"))]
pub mod config;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod python;
mod wire;

#[cfg(all(feature = "ollama", feature = "openai"))]
pub use config::RuntimeConfig;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use python::{PythonConfig, RunPythonCode};

// Re-export core types for convenience
pub use cloud_agent_core::{
    Agent, AgentError, LlmProvider, Message, ProviderCatalog, ProviderKind, Result, Role,
    RunOutcome, Tool,
};

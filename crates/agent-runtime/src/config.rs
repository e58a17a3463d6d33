//! Runtime configuration
//!
//! Resolved once from the environment at startup. Credentials are read here,
//! never at request time.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cloud_agent_core::{AgentError, DEFAULT_MAX_ITERATIONS, ProviderCatalog, ProviderKind, Result};

use crate::ollama::{OLLAMA_HOST, OllamaConfig, OllamaProvider};
use crate::openai::{GROQ_BASE_URL, OPENAI_BASE_URL, OpenAiConfig, OpenAiProvider};
use crate::python::PythonConfig;

/// Everything the binary needs to assemble an agent
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub openai: Option<OpenAiConfig>,
    pub groq: Option<OpenAiConfig>,
    pub ollama: OllamaConfig,

    /// Backend active at startup
    pub provider: ProviderKind,

    /// Model override for the startup backend
    pub model: Option<String>,

    pub max_iterations: usize,
    pub python: PythonConfig,

    /// Ask for confirmation when a call declares `modifies_resource = "unknown"`
    pub confirm_unknown: bool,
}

impl RuntimeConfig {
    /// Read from process environment variables
    ///
    /// # Errors
    ///
    /// `Config` when a variable holds a malformed value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup function
    ///
    /// # Errors
    ///
    /// `Config` when a variable holds a malformed value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs = parse_var(&var, "AGENT_REQUEST_TIMEOUT_SECS", 120_u64)?;

        let openai = var("OPENAI_API_KEY").map(|key| OpenAiConfig {
            base_url: var("OPENAI_API_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.into()),
            api_key: key,
            timeout_secs,
        });

        let groq = var("GROQ_API_KEY").map(|key| OpenAiConfig {
            base_url: var("GROQ_API_BASE_URL").unwrap_or_else(|| GROQ_BASE_URL.into()),
            api_key: key,
            timeout_secs,
        });

        let ollama = OllamaConfig {
            host: var("OLLAMA_HOST").unwrap_or_else(|| OLLAMA_HOST.into()),
            timeout_secs,
        };

        let provider = match var("AGENT_PROVIDER") {
            Some(name) => name
                .parse::<ProviderKind>()
                .map_err(|e| AgentError::Config(format!("AGENT_PROVIDER: {e}")))?,
            None => ProviderKind::Ollama,
        };

        let max_iterations = parse_var(&var, "AGENT_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if max_iterations == 0 {
            return Err(AgentError::Config(
                "AGENT_MAX_ITERATIONS must be at least 1".into(),
            ));
        }

        let defaults = PythonConfig::default();
        let python = PythonConfig {
            interpreter: var("PYTHON_BIN").unwrap_or(defaults.interpreter),
            timeout: Duration::from_secs(parse_var(
                &var,
                "AGENT_TOOL_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            memory_limit_bytes: parse_var(&var, "AGENT_TOOL_MEMORY_MB", 512_u64)?
                .saturating_mul(1024 * 1024),
            max_output_bytes: parse_var(
                &var,
                "AGENT_TOOL_MAX_OUTPUT_BYTES",
                defaults.max_output_bytes,
            )?,
        };

        Ok(Self {
            openai,
            groq,
            ollama,
            provider,
            model: var("AGENT_MODEL"),
            max_iterations,
            python,
            confirm_unknown: parse_bool(&var, "AGENT_CONFIRM_UNKNOWN", false)?,
        })
    }

    /// Initialize every backend that has what it needs
    ///
    /// Ollama is always present; OpenAI and Groq need an API key.
    ///
    /// # Errors
    ///
    /// `Config` when an HTTP client cannot be built.
    pub fn build_catalog(&self) -> Result<ProviderCatalog> {
        let mut catalog = ProviderCatalog::new();

        catalog.insert(
            ProviderKind::Ollama,
            Arc::new(OllamaProvider::from_config(self.ollama.clone())?),
        );

        match &self.openai {
            Some(config) => catalog.insert(
                ProviderKind::OpenAi,
                Arc::new(OpenAiProvider::from_config(config.clone())?),
            ),
            None => tracing::info!("OPENAI_API_KEY not set, openai provider disabled"),
        }

        match &self.groq {
            Some(config) => catalog.insert(
                ProviderKind::Groq,
                Arc::new(OpenAiProvider::from_config(config.clone())?.named("groq")),
            ),
            None => tracing::info!("GROQ_API_KEY not set, groq provider disabled"),
        }

        Ok(catalog)
    }
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| AgentError::Config(format!("invalid value for {key}: '{raw}' ({e})")))
    })
}

fn parse_bool<F>(var: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(default);
    };

    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AgentError::Config(format!(
            "invalid value for {key}: '{raw}' (expected true or false)"
        ))),
    }
}

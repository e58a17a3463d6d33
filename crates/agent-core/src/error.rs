//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Terminal outcomes of a run that are not failures (final answer, abort,
/// iteration ceiling) are reported through `RunOutcome`, not here.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Backend returned an error response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Backend unreachable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider name is not one of the known backends
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Provider is known but was not initialized at startup
    #[error("Provider {0} not initialized")]
    ProviderNotInitialized(String),

    /// Tool not found in the dispatcher
    #[error("Unknown tool function: {0}")]
    ToolNotFound(String),

    /// Tool arguments failed validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Parse error (e.g., malformed backend response)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::UnsupportedProvider(name) => format!("Unsupported provider: {name}"),
            Self::ProviderNotInitialized(name) => {
                format!("Provider {name} is not configured. Check its API key.")
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

//! # cloud-agent-core
//!
//! Agentic tool-calling loop with a provider-agnostic backend abstraction,
//! a confirmation gate for resource-mutating tools, and explicit tool dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌───────────┐   ┌─────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │ Reasoning │──▶│ SafetyGate  │──▶│    Tool    │   │ Session  │ │
//! │  │   Loop    │   │  (confirm)  │   │ Dispatcher │   │  (log)   │ │
//! │  └─────┬─────┘   └─────────────┘   └────────────┘   └────┬─────┘ │
//! │        │                                                 │       │
//! │        └──────────────▶ LlmProvider (Strategy) ◀─────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait hides which correlation field a backend expects on
//! tool results, so the loop never produces backend-specific fields itself.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod safety;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{LlmProvider, ProviderCatalog, ProviderEntry, ProviderKind};
pub use reasoning::{
    Agent, AgentBuilder, DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS_MESSAGE, RunOutcome,
    ToolUseBehavior,
};
pub use safety::{Confirmation, Confirmer, Mutation, SafetyGate, Verdict};
pub use session::{Session, SessionId};
pub use tool::{
    ParameterSchema, Tool, ToolArguments, ToolCall, ToolCallResult, ToolDescriptor,
    ToolDispatcher,
};

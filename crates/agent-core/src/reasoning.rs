//! Reasoning Loop
//!
//! Drives one conversational turn: request a completion, run the requested
//! tools through the safety gate and dispatcher, feed results back, and stop
//! on a final answer, an abort, or the iteration ceiling.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Role;
use crate::provider::{ProviderCatalog, ProviderKind};
use crate::safety::{Confirmer, SafetyGate};
use crate::session::Session;
use crate::tool::{Tool, ToolCall, ToolCallResult, ToolDispatcher};

/// Text reported when a run hits the iteration ceiling
pub const MAX_ITERATIONS_MESSAGE: &str = "Max iterations reached.";

/// Model round-trips allowed per run unless configured otherwise
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Predicate over a tool's name and its output
pub type StopPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// When a tool result ends the run without another model round-trip
#[derive(Clone, Default)]
pub enum ToolUseBehavior {
    /// Always hand tool results back to the model
    #[default]
    RunLlmAgain,
    /// The first dispatched tool's output is the answer
    StopOnFirstTool,
    /// Stop when one of these tools ran
    StopAtTools(HashSet<String>),
    /// Stop when the predicate holds for (tool name, output)
    Custom(StopPredicate),
}

impl ToolUseBehavior {
    pub fn stop_at_tools<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StopAtTools(names.into_iter().map(Into::into).collect())
    }

    pub fn custom(predicate: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether the run stops after `tool_name` produced `output`
    pub fn should_stop(&self, tool_name: &str, output: &str) -> bool {
        match self {
            Self::RunLlmAgain => false,
            Self::StopOnFirstTool => true,
            Self::StopAtTools(names) => names.contains(tool_name),
            Self::Custom(predicate) => predicate(tool_name, output),
        }
    }
}

impl std::fmt::Debug for ToolUseBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunLlmAgain => f.write_str("RunLlmAgain"),
            Self::StopOnFirstTool => f.write_str("StopOnFirstTool"),
            Self::StopAtTools(names) => f.debug_tuple("StopAtTools").field(names).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Model answered without requesting tools (content trimmed)
    Finished(String),
    /// The continuation policy accepted a tool result as the answer
    ToolOutput { tool_name: String, output: String },
    /// A mutating call was declined; nothing further ran
    Aborted,
    /// Iteration ceiling reached
    MaxIterations,
}

impl RunOutcome {
    /// Text to show for this outcome, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Finished(answer) => Some(answer),
            Self::ToolOutput { output, .. } => Some(output),
            Self::Aborted => None,
            Self::MaxIterations => Some(MAX_ITERATIONS_MESSAGE),
        }
    }

    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// The main Agent struct
pub struct Agent {
    catalog: Arc<ProviderCatalog>,
    kind: ProviderKind,
    model: String,
    session: Session,
    gate: SafetyGate,
    dispatcher: ToolDispatcher,
    tool_use: ToolUseBehavior,
}

impl Agent {
    /// Start building an agent over the given backends
    pub fn builder(catalog: Arc<ProviderCatalog>) -> AgentBuilder {
        AgentBuilder::new(catalog)
    }

    /// Run the agent on one line of user input
    ///
    /// # Errors
    ///
    /// Backend failures and unknown tool names end the turn with an error.
    /// Abort and the iteration ceiling are outcomes, not errors.
    pub async fn run(&mut self, input: &str) -> Result<RunOutcome> {
        let settled = self.session.settle_pending_calls();
        if settled > 0 {
            tracing::debug!(settled, "Answered tool calls left over from the previous turn");
        }
        self.session.add_message(Role::User, input);
        tracing::debug!(
            session = %self.session.id,
            messages = self.session.message_count(),
            "Starting run"
        );

        let provider = self.session.provider();
        let descriptors = self.dispatcher.descriptors();
        let max_iterations = self.session.max_iterations();
        let mut iteration = 0;

        while iteration < max_iterations {
            tracing::debug!(
                iteration,
                provider = provider.name(),
                model = %self.model,
                "Requesting completion"
            );

            let reply = provider
                .chat(&self.model, self.session.messages(), &descriptors)
                .await?;

            if !reply.has_tool_calls() {
                let answer = reply.content.trim().to_string();
                self.session.push(reply);
                return Ok(RunOutcome::Finished(answer));
            }

            let calls = reply.tool_calls.clone();
            self.session.push(reply);

            for call in &calls {
                if let Some(outcome) = self.process_call(call).await? {
                    return Ok(outcome);
                }
            }

            iteration += 1;
        }

        tracing::warn!(max_iterations, "Iteration ceiling reached");
        Ok(RunOutcome::MaxIterations)
    }

    /// Resolve, gate, dispatch and record one tool call
    ///
    /// Unknown tools and invalid arguments are settled before the gate, so
    /// the user is only asked about calls that would actually run.
    /// Returns an outcome when the call ends the run.
    async fn process_call(&mut self, call: &ToolCall) -> Result<Option<RunOutcome>> {
        let args = decode_arguments(call);

        let output = match self.dispatcher.resolve(&call.name, &args) {
            Ok(tool) => {
                if !self.gate.check(&args).is_proceed() {
                    return Ok(Some(RunOutcome::Aborted));
                }
                tracing::info!(tool = %call.name, "Executing tool");
                tool.call(&args).await
            }
            Err(AgentError::ToolValidation(msg)) => {
                tracing::warn!(tool = %call.name, error = %msg, "Rejected tool arguments");
                format!("Error: {msg}")
            }
            Err(e) => return Err(e),
        };

        self.session
            .add_tool_response(&ToolCallResult::for_call(call, output.as_str()));

        if self.tool_use.should_stop(&call.name, &output) {
            tracing::debug!(tool = %call.name, "Tool output accepted as final answer");
            return Ok(Some(RunOutcome::ToolOutput {
                tool_name: call.name.clone(),
                output,
            }));
        }

        Ok(None)
    }

    /// Make another initialized backend active
    ///
    /// The model resets to that backend's default.
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` or `ProviderNotInitialized`; the agent is left
    /// unchanged in both cases.
    pub fn switch_provider(&mut self, name: &str) -> Result<()> {
        let entry = self.catalog.get(name)?;

        self.kind = entry.kind;
        self.model.clone_from(&entry.default_model);
        self.session.set_provider(Arc::clone(&entry.provider));

        tracing::info!(provider = %self.kind, model = %self.model, "Switched provider");
        Ok(())
    }

    /// Override the model for the active backend
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        tracing::info!(model = %self.model, "Switched model");
    }

    pub const fn provider_kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub const fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub const fn tool_use(&self) -> &ToolUseBehavior {
        &self.tool_use
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.kind)
            .field("model", &self.model)
            .field("session", &self.session)
            .field("gate", &self.gate)
            .field("dispatcher", &self.dispatcher)
            .field("tool_use", &self.tool_use)
            .finish_non_exhaustive()
    }
}

/// Decode call arguments, passing undecodable text through unparsed
fn decode_arguments(call: &ToolCall) -> Value {
    call.arguments.decode().unwrap_or_else(|err| {
        tracing::warn!(
            tool = %call.name,
            error = %err,
            "Could not parse tool arguments, continuing with the raw text"
        );
        Value::String(call.arguments.to_encoded())
    })
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    catalog: Arc<ProviderCatalog>,
    provider: ProviderKind,
    model: Option<String>,
    system_prompt: String,
    max_iterations: usize,
    dispatcher: ToolDispatcher,
    confirmer: Option<Box<dyn Confirmer>>,
    skip_confirmation: bool,
    confirm_unknown: bool,
    tool_use: ToolUseBehavior,
}

impl AgentBuilder {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        Self {
            catalog,
            provider: ProviderKind::Ollama,
            model: None,
            system_prompt: String::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            dispatcher: ToolDispatcher::new(),
            confirmer: None,
            skip_confirmation: false,
            confirm_unknown: false,
            tool_use: ToolUseBehavior::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, kind: ProviderKind) -> Self {
        self.provider = kind;
        self
    }

    /// Model to start with instead of the backend default
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.dispatcher.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, dispatcher: ToolDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn confirmer(mut self, confirmer: Box<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    #[must_use]
    pub fn skip_confirmation(mut self, skip: bool) -> Self {
        self.skip_confirmation = skip;
        self
    }

    #[must_use]
    pub fn confirm_unknown(mut self, enabled: bool) -> Self {
        self.confirm_unknown = enabled;
        self
    }

    #[must_use]
    pub fn tool_use(mut self, behavior: ToolUseBehavior) -> Self {
        self.tool_use = behavior;
        self
    }

    /// # Errors
    ///
    /// `Config` when no confirmer was given or the ceiling is zero;
    /// `ProviderNotInitialized` when the starting backend is missing.
    pub fn build(self) -> Result<Agent> {
        let confirmer = self
            .confirmer
            .ok_or_else(|| AgentError::Config("Confirmer is required".into()))?;

        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        let entry = self.catalog.get_kind(self.provider)?;
        let model = self.model.unwrap_or_else(|| entry.default_model.clone());
        let session = Session::new(
            self.system_prompt,
            self.max_iterations,
            Arc::clone(&entry.provider),
        );
        let gate = SafetyGate::new(confirmer)
            .skip_confirmation(self.skip_confirmation)
            .confirm_unknown(self.confirm_unknown);

        tracing::debug!(
            provider = %self.provider,
            model = %model,
            tools = self.dispatcher.len(),
            "Agent ready"
        );

        Ok(Agent {
            catalog: self.catalog,
            kind: self.provider,
            model,
            session,
            gate,
            dispatcher: self.dispatcher,
            tool_use: self.tool_use,
        })
    }
}

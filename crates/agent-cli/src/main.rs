//! cloud-agent terminal
//!
//! Talks to a language-model backend that answers cloud questions by writing
//! and running Python. Resource-mutating code needs confirmation first.

mod repl;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloud_agent_core::{Agent, ProviderKind, ToolUseBehavior};
use cloud_agent_runtime::{RunPythonCode, RuntimeConfig};

use crate::ui::TerminalConfirmer;

const DEFAULT_SYSTEM_PROMPT: &str = r"# Identity

You are an agent designed to write and execute Python code using the `boto3` library to answer AWS-related questions. You operate in a Python execution environment that has valid AWS credentials and access to a tool called `run_python_code`, which runs Python code in an isolated REPL and returns the printed output or error messages.

# Instructions

- Examine the current state of AWS resources relevant to the user's query.
- Analyze the query, previous reasoning steps, and observations.
- Consider several ways to solve the task and pick the best one. If the problem is not solved and you can explore further, proceed without asking the user.
- Decide on the next action: use a tool or provide a final answer.

# Remember

- Prefer code that does not require interactive input.
- Use tools when you need more information. Do not describe commands to run; run them.
- Set `modifies_resource` truthfully and name the resource you are about to change.
- Provide a final answer only when you are confident you have sufficient information.
- Keep answers clear, concise, and accurate.";

#[derive(Parser, Debug)]
#[command(name = "cloud-agent")]
#[command(about = "Chat with your cloud environment", long_about = None)]
#[command(version)]
struct Cli {
    /// Backend to start with (openai, ollama, groq)
    #[arg(long)]
    provider: Option<String>,

    /// Model to start with instead of the backend default
    #[arg(long)]
    model: Option<String>,

    /// Model round-trips allowed per prompt
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Use the first tool result as the answer
    #[arg(long)]
    stop_on_first_tool: bool,

    /// Use the result of this tool as the answer (repeatable)
    #[arg(long, value_name = "NAME")]
    stop_after_tool: Vec<String>,

    /// Do not ask before modifying resources
    #[arg(short, long)]
    yes: bool,

    /// Read the system prompt from a file
    #[arg(long, value_name = "PATH")]
    system_prompt_file: Option<PathBuf>,
}

impl Cli {
    fn tool_use(&self) -> ToolUseBehavior {
        if self.stop_on_first_tool {
            ToolUseBehavior::StopOnFirstTool
        } else if self.stop_after_tool.is_empty() {
            ToolUseBehavior::RunLlmAgain
        } else {
            ToolUseBehavior::stop_at_tools(self.stop_after_tool.iter().cloned())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing; logs go to stderr so they stay out of the REPL
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = RuntimeConfig::from_env()?;
    if let Some(name) = &cli.provider {
        config.provider = name.parse::<ProviderKind>()?;
        config.model = None;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(max) = cli.max_iterations {
        config.max_iterations = max;
    }

    let catalog = Arc::new(config.build_catalog()?);

    for kind in catalog.kinds() {
        let entry = catalog.get_kind(kind)?;
        match entry.provider.health_check().await {
            Ok(true) => tracing::info!(provider = %kind, "Backend reachable"),
            Ok(false) | Err(_) => {
                tracing::warn!(provider = %kind, "Backend not reachable, requests to it will fail");
            }
        }
    }

    let system_prompt = match &cli.system_prompt_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read system prompt from {}", path.display()))?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    let mut builder = Agent::builder(Arc::clone(&catalog))
        .provider(config.provider)
        .system_prompt(system_prompt)
        .max_iterations(config.max_iterations)
        .tool(RunPythonCode::new(config.python.clone()))
        .confirmer(Box::new(TerminalConfirmer))
        .skip_confirmation(cli.yes)
        .confirm_unknown(config.confirm_unknown)
        .tool_use(cli.tool_use());
    if let Some(model) = config.model.clone() {
        builder = builder.model(model);
    }
    let agent = builder.build()?;

    ui::welcome(&agent, &catalog);
    repl::run(agent).await
}

//! Read-eval-print loop

use std::io::{self, Write};

use cloud_agent_core::Agent;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ui;

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Blank,
    Exit,
    SwitchProvider(&'a str),
    SetModel(&'a str),
    Usage(&'static str),
    Prompt(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Self::Exit;
        }

        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        match (head, rest) {
            ("--provider", "") => Self::Usage("Usage: --provider <openai|ollama|groq>"),
            ("--provider", name) => Self::SwitchProvider(name),
            ("--model", "") => Self::Usage("Usage: --model <MODEL NAME>"),
            ("--model", model) => Self::SetModel(model),
            _ => Self::Prompt(line),
        }
    }
}

/// Printed when Ctrl-C interrupts a prompt or a running turn
pub const INTERRUPT_HINT: &str = "Use 'exit' to quit.";

/// Run until `exit`/`quit` or end of input
///
/// A failing turn is reported and the session carries on. Ctrl-C cancels
/// the current turn (a running tool process is killed with it) and leaves
/// the conversation intact.
pub async fn run(mut agent: Agent) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        print!("\n>> ");
        stdout.flush()?;

        // next_line is cancel safe, an interrupted read resumes on the next pass
        let Some(line) = until_interrupted(lines.next_line(), tokio::signal::ctrl_c()).await
        else {
            println!();
            ui::info(INTERRUPT_HINT);
            continue;
        };
        let Some(line) = line? else {
            break;
        };

        match Command::parse(&line) {
            Command::Blank => {}
            Command::Exit => break,
            Command::Usage(usage) => ui::error(usage),
            Command::SwitchProvider(name) => match agent.switch_provider(name) {
                Ok(()) => ui::info(&format!(
                    "Switched to {} ({})",
                    agent.provider_kind(),
                    agent.model()
                )),
                Err(e) => ui::error(&e.user_message()),
            },
            Command::SetModel(model) => {
                agent.set_model(model);
                ui::info(&format!("Model set to {}", agent.model()));
            }
            Command::Prompt(input) => {
                match until_interrupted(agent.run(input), tokio::signal::ctrl_c()).await {
                    Some(Ok(outcome)) => println!("\n{}", ui::render_outcome(&outcome)),
                    Some(Err(e)) => {
                        tracing::debug!(error = ?e, "Turn failed");
                        ui::error(&format!("Error: {e}"));
                    }
                    None => {
                        tracing::debug!("Turn interrupted");
                        println!();
                        ui::info(INTERRUPT_HINT);
                    }
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Drive `task` to completion unless `interrupt` resolves first
///
/// An interrupted task is dropped.
async fn until_interrupted<T>(task: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        output = task => Some(output),
        _ = interrupt => None,
    }
}

//! Terminal rendering and the confirmation prompt

use std::io::{self, BufRead, Write};

use cloud_agent_core::{Agent, Confirmation, Confirmer, ProviderCatalog, RunOutcome};
use console::style;

const ABORTED: &str = "Aborting operation as requested.";

pub fn welcome(agent: &Agent, catalog: &ProviderCatalog) {
    let providers: Vec<&str> = catalog.kinds().into_iter().map(|k| k.as_str()).collect();

    println!("{}", style("cloud-agent").bold().cyan());
    println!("Interact with your cloud environment using natural language.\n");
    println!("Type `--provider [{}]` to switch provider.", providers.join("|"));
    println!("Type `--model [MODEL NAME]` to change the model.");
    println!("Type `exit` to quit.\n");
    println!(
        "{}",
        style(format!("Using {} ({})", agent.provider_kind(), agent.model())).dim()
    );
    println!("How can I help you today?");
}

/// Styled text for a finished run
pub fn render_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Finished(answer) => style(answer).green().to_string(),
        RunOutcome::ToolOutput { output, .. } => style(output).blue().to_string(),
        RunOutcome::Aborted => style(ABORTED).red().to_string(),
        RunOutcome::MaxIterations => style(outcome.text().unwrap_or_default()).yellow().to_string(),
    }
}

pub fn info(message: &str) {
    println!("{}", style(message).cyan());
}

pub fn error(message: &str) {
    eprintln!("{}", style(message).red());
}

/// Map a menu answer to a confirmation
pub fn parse_choice(input: &str) -> Option<Confirmation> {
    match input.trim() {
        "1" => Some(Confirmation::Proceed),
        "2" => Some(Confirmation::ProceedAlways),
        "3" => Some(Confirmation::Abort),
        _ => None,
    }
}

/// Asks on the terminal before a resource is modified
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, resource_name: &str) -> Confirmation {
        println!();
        println!(
            "{} will be modified.",
            style(resource_name).bold().yellow()
        );
        println!("Do you want to proceed?\n");
        println!("{} Yes", style("1)").bold());
        println!("{} Yes, and don't ask me again", style("2)").bold());
        println!("{} No", style("3)").bold());

        let stdin = io::stdin();
        loop {
            print!("Enter your choice (1/2/3): ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                // end of input can never authorize a modification
                Ok(0) | Err(_) => return Confirmation::Abort,
                Ok(_) => {}
            }

            if let Some(choice) = parse_choice(&line) {
                return choice;
            }
            println!("{}", style("Please enter 1, 2 or 3.").red());
        }
    }
}

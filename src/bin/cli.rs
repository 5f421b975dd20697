//! toolpilot interactive CLI
//!
//! Binds one session and drives the step loop from the terminal: goals in,
//! streamed summaries out, confirmation prompts for dangerous tools.

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use console::style;
use dialoguer::{Confirm, Input, Select};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use toolpilot::agent::{Agent, InteractionChannel, UserDecision};
use toolpilot::config::{load_config, load_config_from_path, validate_config};
use toolpilot::logging::init_logging;
use toolpilot::RunStatus;

#[derive(Parser)]
#[command(name = "toolpilot", version, about = "LLM-driven tool-execution orchestrator")]
struct Args {
    /// Path to the configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Run a single goal and exit instead of starting the REPL
    #[arg()]
    goal: Option<String>,

    /// Skip the per-step decision prompt
    #[arg(long)]
    auto: bool,

    /// Maximum steps per goal (defaults to the configured context.max_rounds)
    #[arg(long)]
    max_steps: Option<u32>,
}

/// Terminal-backed interaction channel
struct TerminalInteraction;

#[async_trait]
impl InteractionChannel for TerminalInteraction {
    async fn confirm_dangerous(&self, tool_name: &str, arguments: &Value) -> bool {
        let prompt = format!(
            "Dangerous operation {} with arguments {}. Run it?",
            style(tool_name).red().bold(),
            arguments
        );
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }

    async fn on_summary_chunk(&self, chunk: &str) {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    }

    async fn decide(&self) -> UserDecision {
        println!();
        let decision = tokio::task::spawn_blocking(|| {
            let items = ["continue", "stop", "edit goal", "replan", "clear history"];
            let index = Select::new()
                .with_prompt("Next")
                .items(&items)
                .default(0)
                .interact()
                .unwrap_or(0);
            match index {
                1 => UserDecision::Stop,
                2 => {
                    let new_goal: String = Input::new()
                        .with_prompt("New goal")
                        .allow_empty(false)
                        .interact_text()
                        .unwrap_or_default();
                    UserDecision::Edit(new_goal)
                }
                3 => UserDecision::Replan,
                4 => UserDecision::Clear,
                _ => UserDecision::Continue,
            }
        })
        .await
        .unwrap_or(UserDecision::Continue);
        decision
    }

    async fn confirm_clear_history(&self) -> bool {
        tokio::task::spawn_blocking(|| {
            Confirm::new()
                .with_prompt("Clear history for the next task?")
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

async fn run_goal(agent: &Agent, goal: &str, history: &mut Vec<toolpilot::HistoryEntry>, args: &Args) {
    let interaction = TerminalInteraction;
    let max_steps = args
        .max_steps
        .unwrap_or(agent.config().context.max_rounds);
    let outcome = agent
        .execute_interactive(
            goal,
            history,
            max_steps,
            args.auto,
            &interaction,
            CancellationToken::new(),
        )
        .await;

    println!();
    let status = match outcome.status {
        RunStatus::Success => style("success").green(),
        RunStatus::Stopped => style("stopped").yellow(),
        RunStatus::Error => style("error").red(),
    };
    println!(
        "{} {} ({} steps recorded)",
        style("run finished:").bold(),
        status,
        outcome.results.len()
    );
    if !outcome.final_summary.is_empty() {
        println!("{} {}", style("summary:").bold(), outcome.final_summary);
    }
}

/// Plan-then-execute without the step loop; dangerous calls are confirmed
/// as a batch first.
async fn run_one_shot(agent: &Agent, goal: &str) {
    use toolpilot::agent::PlanExecution;

    match agent.execute_plan(goal).await {
        Ok(PlanExecution::Executed { results }) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).unwrap_or_default()
            );
        }
        Ok(PlanExecution::NeedConfirm { dangerous, all }) => {
            let names: Vec<_> = dangerous.iter().map(|call| call.name.as_str()).collect();
            let prompt = format!(
                "Plan contains dangerous operations ({}). Run the whole plan?",
                names.join(", ")
            );
            let approved = tokio::task::spawn_blocking(move || {
                Confirm::new()
                    .with_prompt(prompt)
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            })
            .await
            .unwrap_or(false);

            if approved {
                let results = agent.execute_confirmed(all).await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&results).unwrap_or_default()
                );
            } else {
                println!("{}", style("plan cancelled").yellow());
            }
        }
        Err(e) => eprintln!("{} {}", style("error:").red(), e),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading config")?,
    };

    init_logging(&config.logging).ok();

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        eprintln!("{} {}: {}", style("warning").yellow(), warning.path, warning.message);
    }
    if !validation.valid {
        for error in &validation.errors {
            eprintln!("{} {}: {}", style("error").red(), error.path, error.message);
        }
        anyhow::bail!("invalid configuration");
    }

    let mut agent = Agent::new(config)?;
    agent.initialize().await.context("initializing agent")?;
    let agent = Arc::new(agent);

    let tools = agent.list_tools().await;
    println!(
        "{} {} tools from {} provider(s)",
        style("ready:").green().bold(),
        tools.len(),
        agent.service_status().await.len()
    );

    let mut history = Vec::new();

    if let Some(goal) = &args.goal {
        run_goal(&agent, goal, &mut history, &args).await;
        agent.close().await;
        return Ok(());
    }

    // REPL: one session, goal per line. "!cmd" routes a raw command by
    // capability analysis, "?goal" plans and executes without the step
    // loop; empty line or "exit" quits.
    loop {
        let goal: String = tokio::task::spawn_blocking(|| {
            Input::new()
                .with_prompt("goal")
                .allow_empty(true)
                .interact_text()
                .unwrap_or_default()
        })
        .await?;

        let goal = goal.trim().to_string();
        if goal.is_empty() || goal == "exit" || goal == "quit" {
            break;
        }

        if let Some(command) = goal.strip_prefix('!') {
            let capabilities = agent.analyze_goal(command);
            match agent.execute_command(command, &capabilities).await {
                Ok(envelope) => println!(
                    "{}",
                    serde_json::to_string_pretty(&envelope).unwrap_or_default()
                ),
                Err(e) => eprintln!("{} {}", style("error:").red(), e),
            }
            continue;
        }

        if let Some(one_shot) = goal.strip_prefix('?') {
            run_one_shot(&agent, one_shot.trim()).await;
            continue;
        }

        run_goal(&agent, &goal, &mut history, &args).await;
    }

    agent.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", style("fatal:").red().bold(), e);
        std::process::exit(1);
    }
}

//! Prompt templates for planning and summarization

use handlebars::Handlebars;
use serde::Serialize;

use crate::agent::types::{HistoryEntry, StepCommand};
use crate::error::{Error, Result};
use crate::providers::ToolDescriptor;

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

const PLANNING_TEMPLATE: &str = "\
Operating system: {{os_tag}}.
Analyze the user goal against the execution history and produce the single \
next tool call (or none if the goal is complete). Store any produced files \
under the tmp directory of the current path.

Available tools:
{{catalog}}
{{history}}
User goal: {{goal}}

Output a JSON list containing zero or one tool call, for example:
[
  {\"name\": \"read_file\", \"arguments\": {\"path\": \"notes.txt\"}}
]
Return [] when the goal is complete.
Follow the suggestion from the latest intermediate summary when one exists.
Avoid repeating a call that just succeeded without progress; pick a \
different tool or different arguments instead.

Tool call:";

const INTERMEDIATE_TEMPLATE: &str = "\
You are a task-execution agent. The user goal: {{goal}}
Execution history so far: {{history}}
Summarize the current progress and any problems concisely, then suggest the \
next step.";

const FINAL_TEMPLATE: &str = "\
You are a task-execution agent. The user goal: {{goal}}
Complete execution history: {{history}}
Summarize the overall process and the final outcome concisely, and note any \
improvements for next time.";

#[derive(Serialize)]
struct PlanningData {
    os_tag: String,
    catalog: String,
    history: String,
    goal: String,
}

#[derive(Serialize)]
struct SummaryData {
    goal: String,
    history: String,
}

/// Build the planning prompt from the catalog snapshot and truncated history
pub fn planning_prompt(
    goal: &str,
    catalog: &[ToolDescriptor],
    os_tag: &str,
    history: &[HistoryEntry],
) -> Result<String> {
    let template = PromptTemplate::new("plan", PLANNING_TEMPLATE)?;
    template.render(&PlanningData {
        os_tag: os_tag.to_string(),
        catalog: serde_json::to_string(catalog)?,
        history: render_history(history),
        goal: goal.to_string(),
    })
}

/// Build the intermediate summary prompt
pub fn intermediate_summary_prompt(goal: &str, history: &[HistoryEntry]) -> Result<String> {
    let template = PromptTemplate::new("intermediate", INTERMEDIATE_TEMPLATE)?;
    template.render(&SummaryData {
        goal: goal.to_string(),
        history: serde_json::to_string(history)?,
    })
}

/// Build the final summary prompt
pub fn final_summary_prompt(goal: &str, history: &[HistoryEntry]) -> Result<String> {
    let template = PromptTemplate::new("final", FINAL_TEMPLATE)?;
    template.render(&SummaryData {
        goal: goal.to_string(),
        history: serde_json::to_string(history)?,
    })
}

/// Render the history step by step: each step's tool call, result, and
/// intermediate summary.
fn render_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let steps: Vec<String> = history
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut lines = vec![format!("Step {}:", index + 1)];
            match &entry.command {
                StepCommand::Call(call) => {
                    lines.push(format!(
                        "- proposed tool call: {}",
                        serde_json::to_string(call).unwrap_or_default()
                    ));
                }
                StepCommand::Notice(notice) => {
                    lines.push(format!("- system notice: {}", notice.notice));
                }
            }
            lines.push(format!(
                "- result: {}",
                serde_json::to_string(&entry.result).unwrap_or_default()
            ));
            if let Some(summary) = &entry.summary {
                lines.push(format!("- intermediate summary: {}", summary));
            }
            lines.join("\n")
        })
        .collect();

    format!("\nExecution history:\n{}\n", steps.join("\n\n"))
}

//! The adaptive step loop
//!
//! One step per iteration: plan the next tool call, judge it against the
//! repetition guard, gate dangerous tools behind confirmation, dispatch
//! through the router, record the normalized result, stream an intermediate
//! summary, and yield for the operator's decision. The loop terminates when
//! the model stops proposing calls, a guard trips, the operator stops it,
//! the step budget runs out, or the cancellation token fires.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::interaction::{InteractionChannel, UserDecision};
use super::signature::{call_signature, GuardVerdict, RepeatGuard};
use super::types::{sanitize_envelope, HistoryEntry, RunOutcome, RunStatus};
use crate::config::SecurityConfig;
use crate::llm::{LanguageModel, TextStream};
use crate::providers::{ResultEnvelope, ToolRouter};

/// Placeholder stored when a summary model call fails; the loop never
/// aborts a step over a summary.
const SUMMARY_UNAVAILABLE: &str = "[summary unavailable]";

/// Per-invocation loop limits and policy
#[derive(Debug, Clone)]
pub struct StepLoopConfig {
    /// Maximum steps before the loop breaks to the final summary
    pub max_steps: u32,
    /// Skip the per-step decision gate
    pub auto_continue: bool,
    /// Confirmation policy and the dangerous-tool set
    pub security: SecurityConfig,
}

impl StepLoopConfig {
    pub fn new(max_steps: u32, auto_continue: bool, security: SecurityConfig) -> Self {
        StepLoopConfig {
            max_steps: max_steps.max(1),
            auto_continue,
            security,
        }
    }
}

/// The planner/executor driving one request
pub struct StepLoop<'a> {
    router: &'a ToolRouter,
    model: Option<Arc<dyn LanguageModel>>,
    interaction: &'a dyn InteractionChannel,
    cancel: CancellationToken,
}

impl<'a> StepLoop<'a> {
    pub fn new(
        router: &'a ToolRouter,
        model: Option<Arc<dyn LanguageModel>>,
        interaction: &'a dyn InteractionChannel,
        cancel: CancellationToken,
    ) -> Self {
        StepLoop {
            router,
            model,
            interaction,
            cancel,
        }
    }

    /// Run the loop over a session's history.
    ///
    /// The history is mutated in place: exactly one entry is appended per
    /// step, and the list is only ever emptied whole (operator `clear` or
    /// the post-summary prompt), never partially.
    pub async fn run(
        &self,
        goal: &str,
        history: &mut Vec<HistoryEntry>,
        config: &StepLoopConfig,
    ) -> RunOutcome {
        let mut goal = goal.to_string();
        let mut guard = RepeatGuard::new();
        let mut step: u32 = 0;
        let os_tag = os_tag();

        while step < config.max_steps {
            if self.cancel.is_cancelled() {
                info!("step loop cancelled before step {}", step + 1);
                return RunOutcome {
                    status: RunStatus::Stopped,
                    results: history.clone(),
                    final_summary: String::new(),
                };
            }

            // 1. Plan: catalog snapshot, then one proposed call (or done).
            let catalog = self.router.list_tools().await;
            let calls = match &self.model {
                Some(model) => {
                    match model.plan_next(&goal, &catalog, &os_tag, history).await {
                        Ok(calls) => calls,
                        Err(e) => {
                            let message = format!("planning failed: {}", e);
                            warn!("{}", message);
                            history.push(HistoryEntry::notice(
                                &message,
                                ResultEnvelope::error(message.clone()),
                            ));
                            return RunOutcome {
                                status: RunStatus::Error,
                                results: history.clone(),
                                final_summary: message,
                            };
                        }
                    }
                }
                None => Vec::new(),
            };

            let Some(call) = calls.into_iter().next() else {
                info!("model proposed no further calls, finishing");
                return self.finalize(RunStatus::Success, &goal, history).await;
            };
            info!("step {}: proposed call {}", step + 1, call.name);

            // 2. Repetition guard.
            let signature = call_signature(&call);
            match guard.observe(&signature) {
                GuardVerdict::HardStop => {
                    let rationale = format!(
                        "aborted due to repetition: {} proposed {} times in a row",
                        signature,
                        guard.repeat_count()
                    );
                    warn!("{}", rationale);
                    history.push(HistoryEntry::notice(
                        &rationale,
                        ResultEnvelope::error(rationale.clone()),
                    ));
                    // No final-summary model call on a hard stop.
                    return RunOutcome {
                        status: RunStatus::Error,
                        results: history.clone(),
                        final_summary: rationale,
                    };
                }
                GuardVerdict::SoftBlock => {
                    let notice = format!(
                        "repeated call {} rejected; choose a different action next step",
                        signature
                    );
                    warn!("{}", notice);
                    history.push(HistoryEntry::notice(
                        &notice,
                        ResultEnvelope::info(notice.clone()),
                    ));
                    step += 1;
                    continue;
                }
                GuardVerdict::Execute => {}
            }

            // 3. Dangerous-tool gate.
            if self.requires_confirmation(&call.name, config) {
                let approved = self
                    .interaction
                    .confirm_dangerous(&call.name, &call.arguments_value())
                    .await;
                if !approved {
                    info!("operator rejected dangerous tool '{}'", call.name);
                    history.push(HistoryEntry::call(
                        call,
                        sanitize_envelope(ResultEnvelope::cancelled(
                            "operator rejected dangerous tool call",
                        )),
                    ));
                    step += 1;
                    continue;
                }
            }

            // 4. Dispatch through the router.
            let envelope = match self.router.call(&call.name, call.arguments_value()).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    // No provider for this tool: record it and give the
                    // model one more planning step to pick another tool.
                    let message = format!("tool '{}' unavailable: {}", call.name, e);
                    warn!("{}", message);
                    guard.record_outcome(&signature, false);
                    history.push(HistoryEntry::notice(
                        &message,
                        ResultEnvelope::error(message.clone()),
                    ));
                    step += 1;
                    continue;
                }
            };
            guard.record_outcome(&signature, envelope.is_success());

            // A cancellation that fired mid-call discards the outcome.
            if self.cancel.is_cancelled() {
                info!("step loop cancelled during dispatch, discarding outcome");
                return RunOutcome {
                    status: RunStatus::Stopped,
                    results: history.clone(),
                    final_summary: String::new(),
                };
            }

            // 5. Record the normalized result.
            info!("step {}: {} -> {}", step + 1, call.name, envelope.status);
            history.push(HistoryEntry::call(call, sanitize_envelope(envelope)));

            // 6. Intermediate summary, streamed to the operator.
            if let Some(model) = &self.model {
                let summary = self
                    .stream_summary(model.intermediate_summary(&goal, history).await)
                    .await;
                if let Some(last) = history.last_mut() {
                    last.summary = Some(summary);
                }
            }

            // 7. Operator decision gate.
            if !config.auto_continue && !config.security.auto_continue_interactive {
                match self.interaction.decide().await {
                    UserDecision::Continue => {}
                    UserDecision::Stop => {
                        info!("operator stopped the loop");
                        return self.finalize(RunStatus::Stopped, &goal, history).await;
                    }
                    UserDecision::Edit(new_goal) => {
                        info!("goal edited by operator");
                        goal = new_goal;
                    }
                    UserDecision::Replan => {
                        info!("operator requested a replan");
                    }
                    UserDecision::Clear => {
                        info!("operator cleared the history");
                        history.clear();
                    }
                }
            }

            // 8. Step bookkeeping.
            step += 1;
        }

        info!("step budget of {} exhausted", config.max_steps);
        self.finalize(RunStatus::Success, &goal, history).await
    }

    /// Whether this tool needs operator confirmation before running
    fn requires_confirmation(&self, tool_name: &str, config: &StepLoopConfig) -> bool {
        config
            .security
            .dangerous_tools
            .iter()
            .any(|dangerous| dangerous == tool_name)
            && config.security.shell_confirm
            && !config.security.auto_continue_dangerous
    }

    /// Run the final summary, offer the one-shot history clear, and build
    /// the outcome.
    async fn finalize(
        &self,
        status: RunStatus,
        goal: &str,
        history: &mut Vec<HistoryEntry>,
    ) -> RunOutcome {
        let final_summary = match &self.model {
            Some(model) => {
                self.stream_summary(model.final_summary(goal, history).await)
                    .await
            }
            None => String::new(),
        };

        let results = history.clone();
        if self.interaction.confirm_clear_history().await {
            info!("history cleared for the next task");
            history.clear();
        }

        RunOutcome {
            status,
            results,
            final_summary,
        }
    }

    /// Forward a summary stream to the operator chunk by chunk and collect
    /// the full text. Summary failures degrade to a placeholder.
    async fn stream_summary(&self, stream: crate::error::Result<TextStream>) -> String {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("summary request failed: {}", e);
                return SUMMARY_UNAVAILABLE.to_string();
            }
        };

        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    self.interaction.on_summary_chunk(&chunk).await;
                    collected.push_str(&chunk);
                }
                Err(e) => {
                    warn!("summary stream broke: {}", e);
                    if collected.is_empty() {
                        return SUMMARY_UNAVAILABLE.to_string();
                    }
                    break;
                }
            }
        }
        collected
    }
}

/// Operating-system tag passed to the planner
pub fn os_tag() -> String {
    match std::env::consts::OS {
        "windows" => "Windows".to_string(),
        "macos" => "Darwin".to_string(),
        "linux" => "Linux".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::interaction::{AutoInteraction, ScriptedInteraction};
    use crate::agent::types::StepCommand;
    use crate::config::RoutingStrategy;
    use crate::error::{Error, Result};
    use crate::llm::TextStream;
    use crate::providers::{
        EnvelopeStatus, ToolCall, ToolDescriptor, ToolProvider,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Model that replays a fixed sequence of planning responses and
    /// produces fixed summaries.
    struct ScriptedPlanner {
        plans: Mutex<VecDeque<Vec<ToolCall>>>,
        summary_calls: AtomicU32,
        final_calls: AtomicU32,
    }

    impl ScriptedPlanner {
        fn new(plans: Vec<Vec<ToolCall>>) -> Self {
            ScriptedPlanner {
                plans: Mutex::new(plans.into()),
                summary_calls: AtomicU32::new(0),
                final_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedPlanner {
        fn model_name(&self) -> &str {
            "scripted-planner"
        }

        fn context_window(&self) -> usize {
            4096
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
            Ok(Box::pin(futures::stream::iter(vec![Ok("chunk".to_string())])))
        }

        async fn plan_next(
            &self,
            _goal: &str,
            _catalog: &[ToolDescriptor],
            _os_tag: &str,
            _history: &[HistoryEntry],
        ) -> Result<Vec<ToolCall>> {
            Ok(self.plans.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn intermediate_summary(
            &self,
            _goal: &str,
            _history: &[HistoryEntry],
        ) -> Result<TextStream> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(futures::stream::iter(vec![Ok(
                "step summary".to_string()
            )])))
        }

        async fn final_summary(
            &self,
            _goal: &str,
            _history: &[HistoryEntry],
        ) -> Result<TextStream> {
            self.final_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(futures::stream::iter(vec![Ok(
                "final summary".to_string()
            )])))
        }
    }

    /// Provider succeeding on every call
    struct StubProvider {
        tools: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl ToolProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }

        async fn capabilities(&self) -> Vec<String> {
            Vec::new()
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) {}

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(self
                .tools
                .iter()
                .map(|name| ToolDescriptor::new(*name, "", json!({"type": "object"})))
                .collect())
        }

        async fn call(&self, name: &str, _arguments: Value) -> Result<ResultEnvelope> {
            if self.fail {
                return Err(Error::Connection("down".into()));
            }
            Ok(ResultEnvelope::success(json!({"tool": name})))
        }
    }

    fn router_with(tools: Vec<&'static str>) -> ToolRouter {
        let mut router = ToolRouter::new(RoutingStrategy::CapabilityMatch);
        router.register(Arc::new(StubProvider { tools, fail: false }), 0);
        router
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args)
    }

    fn config(max_steps: u32, auto_continue: bool) -> StepLoopConfig {
        StepLoopConfig::new(max_steps, auto_continue, SecurityConfig::default())
    }

    #[tokio::test]
    async fn happy_path_executes_once_and_summarizes() {
        let router = router_with(vec!["list_directory"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("list_directory", json!({"path": "./tmp"}))],
            vec![],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(
            &router,
            Some(model.clone()),
            &interaction,
            CancellationToken::new(),
        );

        let mut history = Vec::new();
        let outcome = looped
            .run("list the tmp directory", &mut history, &config(10, true))
            .await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].result.status, EnvelopeStatus::Success);
        assert_eq!(outcome.final_summary, "final summary");
        assert_eq!(model.final_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.results[0].summary.as_deref(),
            Some("step summary")
        );
    }

    #[tokio::test]
    async fn soft_block_rejects_the_repeat_without_executing() {
        let router = router_with(vec!["move_mouse", "key_press"]);
        let repeated = call("move_mouse", json!({"x": 1, "y": 2}));
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![repeated.clone()],
            vec![repeated],
            vec![call("key_press", json!({"key": "enter"}))],
            vec![],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("drive the ui", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        // Executed, notice, executed: three entries, not four.
        assert_eq!(outcome.results.len(), 3);
        assert!(matches!(outcome.results[0].command, StepCommand::Call(_)));
        match &outcome.results[1].command {
            StepCommand::Notice(notice) => assert!(notice.notice.contains("rejected")),
            StepCommand::Call(_) => panic!("second entry should be the rejection notice"),
        }
        assert_eq!(outcome.results[1].result.status, EnvelopeStatus::Info);
        match &outcome.results[2].command {
            StepCommand::Call(call) => assert_eq!(call.name, "key_press"),
            StepCommand::Notice(_) => panic!("third entry should be the key press"),
        }
    }

    #[tokio::test]
    async fn identical_stream_hard_stops_with_error() {
        let router = router_with(vec!["mouse_click"]);
        let repeated = call("mouse_click", json!({"x": 5, "y": 5}));
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![repeated.clone()],
            vec![repeated.clone()],
            vec![repeated.clone()],
            vec![repeated.clone()],
            vec![repeated],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(
            &router,
            Some(model.clone()),
            &interaction,
            CancellationToken::new(),
        );

        let mut history = Vec::new();
        let outcome = looped.run("click forever", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.final_summary.contains("aborted due to repetition"));
        // The summary equals the notice rationale; no final-summary model call.
        assert_eq!(model.final_calls.load(Ordering::SeqCst), 0);
        match outcome.results.last().map(|entry| &entry.command) {
            Some(StepCommand::Notice(notice)) => {
                assert!(notice.notice.contains("aborted due to repetition"));
                assert_eq!(outcome.final_summary, notice.notice);
            }
            _ => panic!("expected a trailing hard-stop notice"),
        }
        // First and third proposals executed, second soft-blocked, fourth aborted.
        assert_eq!(outcome.results.len(), 4);
        assert!(matches!(outcome.results[0].command, StepCommand::Call(_)));
        assert!(matches!(outcome.results[1].command, StepCommand::Notice(_)));
        assert!(matches!(outcome.results[2].command, StepCommand::Call(_)));
    }

    #[tokio::test]
    async fn rejected_dangerous_call_is_recorded_cancelled() {
        let router = router_with(vec!["execute_shell", "list_directory"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("execute_shell", json!({"command": "rm -rf /"}))],
            vec![],
        ]));
        // The operator answers "no".
        let interaction = ScriptedInteraction::new(vec![false], vec![]);
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("clean up", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].result.status, EnvelopeStatus::Cancelled);
        match &outcome.results[0].command {
            StepCommand::Call(call) => assert_eq!(call.name, "execute_shell"),
            StepCommand::Notice(_) => panic!("cancelled entry keeps the command"),
        }
    }

    #[tokio::test]
    async fn auto_continue_dangerous_skips_the_prompt() {
        let router = router_with(vec!["execute_shell"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("execute_shell", json!({"command": "echo hi"}))],
            vec![],
        ]));
        // Would deny if asked; must not be asked.
        let interaction = ScriptedInteraction::new(vec![false], vec![]);
        let mut security = SecurityConfig::default();
        security.auto_continue_dangerous = true;
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped
            .run(
                "run it",
                &mut history,
                &StepLoopConfig::new(10, true, security),
            )
            .await;

        assert_eq!(outcome.results[0].result.status, EnvelopeStatus::Success);
    }

    #[tokio::test]
    async fn missing_tool_appends_notice_and_replans() {
        let router = router_with(vec!["list_directory"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("no_such_tool", json!({}))],
            vec![call("list_directory", json!({"path": "."}))],
            vec![],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("try tools", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.results.len(), 2);
        assert!(matches!(outcome.results[0].command, StepCommand::Notice(_)));
        assert_eq!(outcome.results[1].result.status, EnvelopeStatus::Success);
    }

    #[tokio::test]
    async fn stop_decision_finalizes_with_stopped_status() {
        let router = router_with(vec!["sleep"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("sleep", json!({"ms": 1}))],
            vec![call("sleep", json!({"ms": 2}))],
        ]));
        let interaction = ScriptedInteraction::new(vec![], vec![UserDecision::Stop]);
        let looped = StepLoop::new(
            &router,
            Some(model.clone()),
            &interaction,
            CancellationToken::new(),
        );

        let mut history = Vec::new();
        let outcome = looped.run("wait around", &mut history, &config(10, false)).await;

        assert_eq!(outcome.status, RunStatus::Stopped);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.final_summary, "final summary");
        // Streamed chunks went through the interaction channel.
        assert!(interaction.streamed().contains("step summary"));
        assert!(interaction.streamed().contains("final summary"));
    }

    #[tokio::test]
    async fn edit_decision_swaps_the_goal_and_keeps_history() {
        let router = router_with(vec!["sleep"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("sleep", json!({"ms": 1}))],
            vec![],
        ]));
        let interaction = ScriptedInteraction::new(
            vec![],
            vec![UserDecision::Edit("the new goal".to_string())],
        );
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("old goal", &mut history, &config(10, false)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn clear_decision_empties_history_in_place() {
        let router = router_with(vec!["sleep"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("sleep", json!({"ms": 1}))],
            vec![call("sleep", json!({"ms": 2}))],
            vec![],
        ]));
        let interaction = ScriptedInteraction::new(
            vec![],
            vec![UserDecision::Clear, UserDecision::Continue],
        );
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("do things", &mut history, &config(10, false)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        // Cleared after step one; only step two's entry remains.
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn max_steps_breaks_to_the_final_summary() {
        let router = router_with(vec!["sleep"]);
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![call("sleep", json!({"ms": 1}))],
            vec![call("sleep", json!({"ms": 2}))],
            vec![call("sleep", json!({"ms": 3}))],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(
            &router,
            Some(model.clone()),
            &interaction,
            CancellationToken::new(),
        );

        let mut history = Vec::new();
        let outcome = looped.run("keep napping", &mut history, &config(2, true)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(model.final_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_model_call() {
        let router = router_with(vec!["sleep"]);
        let model = Arc::new(ScriptedPlanner::new(vec![vec![call(
            "sleep",
            json!({"ms": 1}),
        )]]));
        let interaction = AutoInteraction::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let looped = StepLoop::new(&router, Some(model.clone()), &interaction, cancel);

        let mut history = Vec::new();
        let outcome = looped.run("anything", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Stopped);
        assert!(outcome.results.is_empty());
        assert!(outcome.final_summary.is_empty());
        assert_eq!(model.final_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_step_appends_exactly_one_entry() {
        let router = router_with(vec!["a", "b"]);
        let repeated = call("a", json!({}));
        let model = Arc::new(ScriptedPlanner::new(vec![
            vec![repeated.clone()],
            vec![repeated],
            vec![call("b", json!({}))],
            vec![call("no_such_tool", json!({}))],
            vec![],
        ]));
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(&router, Some(model), &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("mixed run", &mut history, &config(10, true)).await;

        // Four steps ran (execute, soft-block, execute, missing-tool notice).
        assert_eq!(outcome.results.len(), 4);
    }

    #[tokio::test]
    async fn no_model_finishes_immediately_with_empty_summary() {
        let router = router_with(vec!["a"]);
        let interaction = AutoInteraction::new();
        let looped = StepLoop::new(&router, None, &interaction, CancellationToken::new());

        let mut history = Vec::new();
        let outcome = looped.run("goal", &mut history, &config(10, true)).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert!(outcome.results.is_empty());
        assert!(outcome.final_summary.is_empty());
    }
}

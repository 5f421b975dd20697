//! Call signatures and the repetition guard
//!
//! A signature canonicalizes a tool call (name plus sorted arguments) so
//! that semantically identical calls compare equal. The guard watches the
//! stream of proposed signatures: the second consecutive identical proposal
//! of an executed call is rejected with a notice, and the chain aborts the
//! run once it reaches the hard-stop threshold.

use serde_json::Value;

use crate::providers::ToolCall;

/// Consecutive identical proposals rejected with a notice at this count
pub const SOFT_BLOCK_THRESHOLD: u32 = 2;

/// Consecutive identical proposals aborting the run at this count
pub const HARD_STOP_THRESHOLD: u32 = 4;

/// Canonical signature: `name(key1=value1, key2=value2, ...)` with keys
/// sorted at every nesting level.
pub fn call_signature(call: &ToolCall) -> String {
    let mut pairs: Vec<(&String, &Value)> = call.arguments.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let rendered: Vec<String> = pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, canonical_value(value)))
        .collect();

    format!("{}({})", call.name, rendered.join(", "))
}

/// Serialize a value with object keys sorted recursively
fn canonical_value(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let inner: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{:?}:{}", key, canonical_value(&map[key])))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_value).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

/// What the guard says about a proposed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Execute the call
    Execute,
    /// Reject without executing; append a notice and continue
    SoftBlock,
    /// Abort the run
    HardStop,
}

/// Tracks consecutive identical proposals across steps.
///
/// Two chains are kept: `last_proposed` (every proposal, surviving soft
/// blocks, so a stubborn model eventually hits the hard stop) and
/// `last_executed` (the gate: only a call identical to the previous
/// successful execution is soft-blocked; the gate is cleared at the block
/// and on failures, so the retry after one notice step runs again and
/// failures never count as repetitions).
#[derive(Debug, Default)]
pub struct RepeatGuard {
    last_proposed: Option<String>,
    last_executed: Option<String>,
    repeat_count: u32,
}

impl RepeatGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current consecutive-identical count
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Judge a proposed signature before dispatch
    pub fn observe(&mut self, signature: &str) -> GuardVerdict {
        if self.last_proposed.as_deref() == Some(signature) {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 1;
        }
        self.last_proposed = Some(signature.to_string());

        if self.repeat_count >= HARD_STOP_THRESHOLD {
            return GuardVerdict::HardStop;
        }
        if self.repeat_count >= SOFT_BLOCK_THRESHOLD
            && self.last_executed.as_deref() == Some(signature)
        {
            self.last_executed = None;
            return GuardVerdict::SoftBlock;
        }
        GuardVerdict::Execute
    }

    /// Record the dispatch outcome for an executed call. Only successes arm
    /// the soft-block gate.
    pub fn record_outcome(&mut self, signature: &str, success: bool) {
        self.last_executed = if success {
            Some(signature.to_string())
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args)
    }

    #[test]
    fn signature_sorts_argument_keys() {
        let a = call("move_mouse", json!({"x": 1, "y": 2}));
        let b = call("move_mouse", json!({"y": 2, "x": 1}));
        assert_eq!(call_signature(&a), call_signature(&b));
        assert_eq!(call_signature(&a), "move_mouse(x=1, y=2)");
    }

    #[test]
    fn signature_sorts_nested_objects() {
        let a = call("t", json!({"opts": {"b": 1, "a": 2}}));
        let b = call("t", json!({"opts": {"a": 2, "b": 1}}));
        assert_eq!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn different_arguments_differ() {
        let a = call("click", json!({"x": 1}));
        let b = call("click", json!({"x": 2}));
        assert_ne!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn second_identical_proposal_is_soft_blocked() {
        let mut guard = RepeatGuard::new();
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        guard.record_outcome("a()", true);
        assert_eq!(guard.observe("a()"), GuardVerdict::SoftBlock);
    }

    #[test]
    fn retry_after_the_block_executes_then_hard_stops() {
        let mut guard = RepeatGuard::new();
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        guard.record_outcome("a()", true);
        assert_eq!(guard.observe("a()"), GuardVerdict::SoftBlock);
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        guard.record_outcome("a()", true);
        assert_eq!(guard.observe("a()"), GuardVerdict::HardStop);
    }

    #[test]
    fn divergent_step_resets_the_chain() {
        let mut guard = RepeatGuard::new();
        guard.observe("a()");
        guard.record_outcome("a()", true);
        assert_eq!(guard.observe("b()"), GuardVerdict::Execute);
        guard.record_outcome("b()", true);
        // The earlier call may be retried after a divergent step.
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        assert_eq!(guard.repeat_count(), 1);
    }

    #[test]
    fn failures_do_not_count_as_repetitions() {
        let mut guard = RepeatGuard::new();
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        guard.record_outcome("a()", false);
        // Same call again: the gate is clear, so it runs.
        assert_eq!(guard.observe("a()"), GuardVerdict::Execute);
        guard.record_outcome("a()", true);
        // Now the success armed the gate.
        assert_eq!(guard.observe("a()"), GuardVerdict::SoftBlock);
    }

    #[test]
    fn stubborn_identical_stream_terminates_within_threshold() {
        let mut guard = RepeatGuard::new();
        let mut verdicts = Vec::new();
        for _ in 0..HARD_STOP_THRESHOLD {
            let verdict = guard.observe("x()");
            if verdict == GuardVerdict::Execute {
                guard.record_outcome("x()", true);
            }
            verdicts.push(verdict.clone());
            if verdict == GuardVerdict::HardStop {
                break;
            }
        }
        assert_eq!(verdicts.last(), Some(&GuardVerdict::HardStop));
        assert!(verdicts.len() as u32 <= HARD_STOP_THRESHOLD);
    }
}

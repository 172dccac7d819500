//! Structured events emitted by the iteration-scope operator.

use serde::{Deserialize, Serialize};

pub(crate) const COMPONENT: &str = "iteration_scope";

/// Correlation ids attached to every event an operator emits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IterationScopeContext {
    pub trace_id: String,
    pub decision_id: String,
    pub policy_id: String,
}

impl IterationScopeContext {
    pub fn new(
        trace_id: impl Into<String>,
        decision_id: impl Into<String>,
        policy_id: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            decision_id: decision_id.into(),
            policy_id: policy_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationScopeEvent {
    pub trace_id: String,
    pub decision_id: String,
    pub policy_id: String,
    pub component: String,
    pub event: String,
    pub outcome: String,
    pub error_code: Option<String>,
    pub schema_hash: String,
    pub slot_count: usize,
}

pub(crate) fn success_event(
    context: &IterationScopeContext,
    event: &str,
    schema_hash: &str,
    slot_count: usize,
) -> IterationScopeEvent {
    IterationScopeEvent {
        trace_id: context.trace_id.clone(),
        decision_id: context.decision_id.clone(),
        policy_id: context.policy_id.clone(),
        component: COMPONENT.to_string(),
        event: event.to_string(),
        outcome: "pass".to_string(),
        error_code: None,
        schema_hash: schema_hash.to_string(),
        slot_count,
    }
}

pub(crate) fn failure_event(
    context: &IterationScopeContext,
    event: &str,
    error_code: &str,
    schema_hash: &str,
    slot_count: usize,
) -> IterationScopeEvent {
    IterationScopeEvent {
        outcome: "fail".to_string(),
        error_code: Some(error_code.to_string()),
        ..success_event(context, event, schema_hash, slot_count)
    }
}

/// One JSON object per line.
pub fn render_jsonl(events: &[IterationScopeEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> IterationScopeContext {
        IterationScopeContext::new("trace-1", "decision-1", "policy-1")
    }

    #[test]
    fn success_event_fields() {
        let event = success_event(&ctx(), "iteration_scope_created", "sha256:aa", 3);
        assert_eq!(event.component, COMPONENT);
        assert_eq!(event.outcome, "pass");
        assert_eq!(event.error_code, None);
        assert_eq!(event.trace_id, "trace-1");
        assert_eq!(event.slot_count, 3);
    }

    #[test]
    fn failure_event_carries_code() {
        let event = failure_event(&ctx(), "copy_into", "FE-ITER-0005", "sha256:aa", 3);
        assert_eq!(event.outcome, "fail");
        assert_eq!(event.error_code.as_deref(), Some("FE-ITER-0005"));
        assert_eq!(event.event, "copy_into");
    }

    #[test]
    fn jsonl_has_one_line_per_event() {
        let events = vec![
            success_event(&ctx(), "materialize", "sha256:aa", 2),
            failure_event(&ctx(), "copy_into", "FE-ITER-0006", "sha256:aa", 2),
        ];
        let out = render_jsonl(&events).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: IterationScopeEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back, events[1]);
    }

    #[test]
    fn jsonl_of_nothing_is_empty() {
        assert_eq!(render_jsonl(&[]).unwrap(), "");
    }
}

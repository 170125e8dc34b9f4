//! Rule matching: every present condition category must hold; among
//! matching rules the highest priority wins, declaration order breaks
//! ties.

use crate::chain::chain_matches;
use crate::context::ContextEvaluator;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use toolshield_core::ToolEvent;
use toolshield_rules::{Rule, RuleSet, WhenClause, lookup_path};
use toolshield_session::SessionState;

/// Everything one rule evaluation may consult. Session-derived fields
/// are snapshotted once before matching begins, so the evaluation is
/// consistent even while the session mutates concurrently.
pub(crate) struct CallView<'a> {
    pub tool: &'a str,
    pub args: &'a Value,
    pub session_keys: &'a BTreeMap<String, Value>,
    pub events: &'a [ToolEvent],
    pub context: &'a HashMap<String, String>,
    pub now: DateTime<Utc>,
}

/// Flatten session counters into the key space rule predicates address:
/// `total_calls`, `pii_tainted` (0/1), `tool_count.<name>`.
pub(crate) fn session_keys(session: &SessionState) -> BTreeMap<String, Value> {
    let mut keys = BTreeMap::new();
    keys.insert("total_calls".to_string(), Value::from(session.total_calls));
    keys.insert(
        "pii_tainted".to_string(),
        Value::from(u64::from(session.pii_tainted)),
    );
    for (tool, count) in &session.tool_counts {
        keys.insert(format!("tool_count.{tool}"), Value::from(*count));
    }
    keys
}

pub(crate) struct MatcherEngine {
    context: ContextEvaluator,
}

impl MatcherEngine {
    pub fn new(context: ContextEvaluator) -> Self {
        Self { context }
    }

    pub fn find_best_match<'r>(
        &self,
        rules: &'r RuleSet,
        view: &CallView<'_>,
        pii_probe: &dyn Fn(&str) -> bool,
    ) -> Option<&'r Rule> {
        let mut best: Option<&Rule> = None;
        for rule in rules.rules.iter().filter(|r| r.enabled) {
            // an earlier match at equal-or-higher priority already wins
            if best.is_some_and(|b| b.priority >= rule.priority) {
                continue;
            }
            if self.rule_matches(&rule.when, view, pii_probe) {
                best = Some(rule);
            }
        }
        best
    }

    fn rule_matches(
        &self,
        when: &WhenClause,
        view: &CallView<'_>,
        pii_probe: &dyn Fn(&str) -> bool,
    ) -> bool {
        if let Some(pattern) = &when.tool
            && !pattern.matches(view.tool)
        {
            return false;
        }
        for (field, predicate) in &when.args {
            if !predicate.evaluate(lookup_path(view.args, field), pii_probe) {
                return false;
            }
        }
        // session keys are flat: `tool_count.web_fetch` is one literal key
        for (key, predicate) in &when.session {
            if !predicate.evaluate(view.session_keys.get(key.as_str()), pii_probe) {
                return false;
            }
        }
        if !when.context.is_empty()
            && !self.context.evaluate_at(&when.context, view.context, view.now)
        {
            return false;
        }
        if !when.chain.is_empty() && !chain_matches(&when.chain, view.events, view.now) {
            return false;
        }
        true
    }
}

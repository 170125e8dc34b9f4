//! Recorded events — what a session remembers about past calls, and
//! what the engine hands to trace sinks after every check.

use crate::pii::PiiType;
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum characters kept of an argument summary in a recorded event.
pub const ARGS_SUMMARY_MAX: usize = 120;

/// One entry in a session's ring buffer. Immutable once recorded;
/// owned exclusively by that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    /// Tool that was called.
    pub tool: String,
    /// When the call was checked.
    pub timestamp: DateTime<Utc>,
    /// The effective verdict that was returned for the call.
    pub verdict: Verdict,
    /// Truncated rendering of the arguments.
    pub args_summary: String,
}

impl ToolEvent {
    /// Build an event, truncating the argument summary to
    /// [`ARGS_SUMMARY_MAX`] characters on a char boundary.
    pub fn new(tool: &str, verdict: Verdict, args_summary: &str) -> Self {
        let summary = if args_summary.chars().count() > ARGS_SUMMARY_MAX {
            let mut s: String = args_summary.chars().take(ARGS_SUMMARY_MAX - 1).collect();
            s.push('…');
            s
        } else {
            args_summary.to_string()
        };
        Self {
            tool: tool.into(),
            timestamp: Utc::now(),
            verdict,
            args_summary: summary,
        }
    }
}

/// The tuple handed to trace sinks after every check. Fire-and-forget;
/// sinks must never block or influence the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub session_id: String,
    pub tool: String,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub pii_types: Vec<PiiType>,
    pub latency_ms: f64,
}

/// Trait for trace sinks (where per-check records are forwarded).
pub trait TraceSink: Send + Sync {
    fn record(&self, record: &TraceRecord);
}

/// A tracing-based sink that logs records via `tracing::info!`.
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, record: &TraceRecord) {
        tracing::info!(
            session = %record.session_id,
            tool = %record.tool,
            verdict = %record.verdict,
            rule = ?record.rule_id,
            pii = ?record.pii_types,
            latency_ms = record.latency_ms,
            "SHIELD"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_summary_kept_verbatim() {
        let ev = ToolEvent::new("shell", Verdict::Allow, "{\"command\":\"ls\"}");
        assert_eq!(ev.args_summary, "{\"command\":\"ls\"}");
    }

    #[test]
    fn long_summary_truncated() {
        let long = "x".repeat(500);
        let ev = ToolEvent::new("shell", Verdict::Block, &long);
        assert_eq!(ev.args_summary.chars().count(), ARGS_SUMMARY_MAX);
        assert!(ev.args_summary.ends_with('…'));
    }

    #[test]
    fn trace_record_serializes() {
        let rec = TraceRecord {
            session_id: "s1".into(),
            tool: "web_fetch".into(),
            verdict: Verdict::Block,
            rule_id: Some("no-internal-ips".into()),
            pii_types: vec![],
            latency_ms: 0.42,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("no-internal-ips"));
    }
}

//! Verdicts and results — the outcome vocabulary of a policy check.

use crate::pii::PiiMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The outcome of evaluating a tool call against the active rule set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The call may proceed.
    #[default]
    Allow,
    /// The call is blocked — the tool must not run.
    Block,
    /// The call may proceed with the redacted argument copy.
    Redact,
    /// The call is held for human approval.
    Approve,
}

impl Verdict {
    /// Whether the tool call is permitted to execute as-is or with
    /// modified arguments.
    pub fn is_permissive(self) -> bool {
        matches!(self, Verdict::Allow | Verdict::Redact)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Allow => "allow",
            Verdict::Block => "block",
            Verdict::Redact => "redact",
            Verdict::Approve => "approve",
        };
        f.write_str(s)
    }
}

/// Severity attached to a rule, carried through to logs and traces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A descriptor handed to an external approval backend when a rule's
/// verdict is [`Verdict::Approve`]. The engine never waits on the
/// resolution; that is the host's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request id.
    pub id: String,
    /// Session the call belongs to.
    pub session_id: String,
    /// Tool awaiting approval.
    pub tool: String,
    /// The arguments as submitted.
    pub args: serde_json::Value,
    /// Rule that demanded approval.
    pub rule_id: String,
    /// Human-readable reason shown to the approver.
    pub message: String,
    /// When the request was created.
    pub requested_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        session_id: &str,
        tool: &str,
        args: serde_json::Value,
        rule_id: &str,
        message: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            tool: tool.into(),
            args,
            rule_id: rule_id.into(),
            message: message.into(),
            requested_at: Utc::now(),
        }
    }
}

/// The structured result of a `check` call.
///
/// Invariant: `modified_args` is `Some` if and only if `verdict` is
/// [`Verdict::Redact`]; `approval` is `Some` if and only if `verdict`
/// is [`Verdict::Approve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldResult {
    /// The effective verdict.
    pub verdict: Verdict,
    /// The matched rule id, if any rule fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Human-readable explanation.
    pub message: String,
    /// PII found while scanning the arguments.
    #[serde(default)]
    pub pii_matches: Vec<PiiMatch>,
    /// The arguments as submitted (kept for audit).
    pub original_args: serde_json::Value,
    /// Redacted argument copy, present only for `Redact`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<serde_json::Value>,
    /// Approval descriptor, present only for `Approve`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRequest>,
}

impl ShieldResult {
    /// An "allow" result with no rule attached.
    pub fn allow(args: serde_json::Value) -> Self {
        Self {
            verdict: Verdict::Allow,
            rule_id: None,
            message: String::new(),
            pii_matches: Vec::new(),
            original_args: args,
            modified_args: None,
            approval: None,
        }
    }
}

//! Rule data model — the types a shield configuration deserializes into.

use crate::conditions::WhenClause;
use crate::{RuleError, RuleResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use toolshield_core::{Severity, Verdict};
use tracing::debug;

/// A complete rule set loaded from configuration. Immutable once
/// validated; replaced wholesale on reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Display name for this shield configuration.
    #[serde(default)]
    pub shield_name: String,

    /// Configuration version string (free-form, for operators).
    #[serde(default)]
    pub version: String,

    /// Verdict applied when no rule matches.
    #[serde(default)]
    pub default_verdict: Verdict,

    /// PII taint-chain configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taint_chain: Option<TaintChainConfig>,

    /// All rules, in declaration order. Order is the tie-break between
    /// equal-priority matches.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// An empty rule set (everything falls through to the default verdict).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and validate a rule set from a TOML string.
    pub fn from_toml(toml_str: &str) -> RuleResult<Self> {
        let set: RuleSet = toml::from_str(toml_str)?;
        set.validate()?;
        debug!(
            shield = %set.shield_name,
            rules = set.rules.len(),
            "rule set parsed and validated"
        );
        Ok(set)
    }

    /// Load and validate a rule set from raw bytes (as delivered by a
    /// remote fetcher).
    pub fn from_slice(bytes: &[u8]) -> RuleResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| RuleError::InvalidEncoding)?;
        Self::from_toml(text)
    }

    /// Load and validate a rule set from a TOML file.
    pub fn from_path(path: &Path) -> RuleResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Validate the whole set: ids unique and non-empty, every condition
    /// well-formed. A set that passes can never fail during evaluation.
    pub fn validate(&self) -> RuleResult<()> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.rules.len());
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleError::DuplicateId {
                    id: rule.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of enabled rules.
    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }

    /// Whether the taint chain is switched on. On by default; an
    /// explicit `[taint_chain]` block with `enabled = false` opts out.
    pub fn taint_chain_enabled(&self) -> bool {
        self.taint_chain.as_ref().is_none_or(|t| t.enabled)
    }

    /// Whether a tool counts as outgoing/exfiltration-capable for the
    /// taint chain.
    pub fn is_outgoing_tool(&self, tool: &str) -> bool {
        if !self.taint_chain_enabled() {
            return false;
        }
        match &self.taint_chain {
            Some(t) if !t.outgoing_tools.is_empty() => t.outgoing_tools.contains(tool),
            _ => DEFAULT_OUTGOING_TOOLS.contains(&tool),
        }
    }
}

/// Tools treated as outgoing when no explicit set is configured.
pub const DEFAULT_OUTGOING_TOOLS: &[&str] = &[
    "send_email",
    "send_message",
    "web_fetch",
    "http_request",
    "upload_file",
];

/// Taint-chain configuration: which tools count as outgoing (capable of
/// exfiltrating data) once a session has seen PII in a tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintChainConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tool names treated as outgoing/exfiltration-capable.
    #[serde(default)]
    pub outgoing_tools: BTreeSet<String>,
}

/// A single shield rule. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id within the rule set.
    pub id: String,

    /// Human-readable description of what this rule enforces.
    #[serde(default)]
    pub description: String,

    /// The condition tree. Empty means the rule fires on every call
    /// (subject to `enabled`).
    #[serde(default)]
    pub when: WhenClause,

    /// Verdict applied when the rule matches.
    #[serde(default)]
    pub then: Verdict,

    /// Message returned to the caller when the rule fires.
    #[serde(default)]
    pub message: String,

    /// Severity carried to logs and traces.
    #[serde(default)]
    pub severity: Severity,

    /// Higher priority wins among simultaneously matching rules.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Whether this rule participates in matching.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}

impl Rule {
    /// Validate that the rule is well-formed.
    pub fn validate(&self) -> RuleResult<()> {
        if self.id.is_empty() {
            return Err(RuleError::InvalidRule {
                id: "(empty)".into(),
                reason: "rule id cannot be empty".into(),
            });
        }
        self.when.validate(&self.id)
    }

    /// The message shown when the rule fires, falling back to a generic
    /// line naming the rule.
    pub fn display_message(&self) -> String {
        if self.message.is_empty() {
            format!("Rule '{}' triggered", self.id)
        } else {
            self.message.clone()
        }
    }
}

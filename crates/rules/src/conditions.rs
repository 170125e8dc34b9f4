//! The typed condition AST — everything a rule's `when` clause can say.
//!
//! A `when` clause is a small closed set of condition categories, all
//! optional and AND-combined: a tool pattern, per-field argument
//! predicates, session-state predicates, context predicates, and
//! temporal chain conditions. The source document's nested maps are
//! deserialized straight into these types, so validation at load time
//! covers every shape a rule can take.

use crate::{RuleError, RuleResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use toolshield_core::Verdict;

/// A rule's full condition tree. A rule matches only when every present
/// category is satisfied; an empty clause matches every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenClause {
    /// Which tools the rule applies to. Absent means any tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolPattern>,
    /// Per-argument-field predicates, keyed by dotted path into the args.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgPredicate>,
    /// Predicates over flattened session-state keys
    /// (`total_calls`, `tool_count.<name>`, `pii_tainted`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub session: BTreeMap<String, ArgPredicate>,
    /// Context predicates (`time_of_day`, `day_of_week`, `sender`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ContextExpect>,
    /// Temporal conditions over the session's recent call history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<ChainCondition>,
}

impl WhenClause {
    /// Validate every category. Called once at load.
    pub fn validate(&self, rule_id: &str) -> RuleResult<()> {
        for (field, pred) in &self.args {
            pred.validate(rule_id, field)?;
        }
        for (key, pred) in &self.session {
            pred.validate(rule_id, key)?;
        }
        for cond in &self.chain {
            cond.validate(rule_id)?;
        }
        Ok(())
    }
}

/// Which tool names a rule applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ToolPatternRepr", into = "ToolPatternRepr")]
pub enum ToolPattern {
    /// Matches every tool (`"*"`).
    Any,
    /// Matches one tool by exact name.
    Exact(String),
    /// Matches any tool in the list.
    AnyOf(Vec<String>),
}

impl ToolPattern {
    /// Does this pattern cover the given tool name?
    pub fn matches(&self, tool: &str) -> bool {
        match self {
            ToolPattern::Any => true,
            ToolPattern::Exact(name) => name == tool,
            ToolPattern::AnyOf(names) => names.iter().any(|n| n == tool),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ToolPatternRepr {
    One(String),
    Many(Vec<String>),
}

impl From<ToolPatternRepr> for ToolPattern {
    fn from(repr: ToolPatternRepr) -> Self {
        match repr {
            ToolPatternRepr::One(s) if s == "*" => ToolPattern::Any,
            ToolPatternRepr::One(s) => ToolPattern::Exact(s),
            ToolPatternRepr::Many(v) => ToolPattern::AnyOf(v),
        }
    }
}

impl From<ToolPattern> for ToolPatternRepr {
    fn from(p: ToolPattern) -> Self {
        match p {
            ToolPattern::Any => ToolPatternRepr::One("*".into()),
            ToolPattern::Exact(s) => ToolPatternRepr::One(s),
            ToolPattern::AnyOf(v) => ToolPatternRepr::Many(v),
        }
    }
}

/// A predicate over a single field. Operators present are AND-combined;
/// an operator key the engine doesn't know is a load-time error
/// (`deny_unknown_fields`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgPredicate {
    /// Substring match on the field's string form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Regex match on the field's string form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<RegexSpec>,
    /// Exact value equality (numbers compare numerically).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<serde_json::Value>,
    /// Whether the field carries detectable PII.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_pii: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl ArgPredicate {
    fn is_empty(&self) -> bool {
        self.contains.is_none()
            && self.regex.is_none()
            && self.equals.is_none()
            && self.has_pii.is_none()
            && self.gt.is_none()
            && self.lt.is_none()
            && self.gte.is_none()
            && self.lte.is_none()
    }

    /// Validate operator presence and compile any regex once to prove it
    /// parses. Called at load; evaluation can then never fail.
    pub fn validate(&self, rule_id: &str, field: &str) -> RuleResult<()> {
        if self.is_empty() {
            return Err(RuleError::InvalidRule {
                id: rule_id.into(),
                reason: format!("predicate on '{field}' has no operators"),
            });
        }
        if let Some(spec) = &self.regex {
            spec.compile().map_err(|detail| RuleError::InvalidRegex {
                id: rule_id.into(),
                field: field.into(),
                detail,
            })?;
        }
        Ok(())
    }

    /// Evaluate against an (optionally missing) JSON value. `pii_probe`
    /// answers "does this text carry PII?" for the `has_pii` operator.
    pub fn evaluate(
        &self,
        value: Option<&serde_json::Value>,
        pii_probe: &dyn Fn(&str) -> bool,
    ) -> bool {
        let text = value.map(value_as_string);

        if let Some(needle) = &self.contains {
            if !text.as_deref().is_some_and(|t| t.contains(needle.as_str())) {
                return false;
            }
        }
        if let Some(spec) = &self.regex {
            if !text.as_deref().is_some_and(|t| spec.is_match(t)) {
                return false;
            }
        }
        if let Some(expected) = &self.equals {
            let ok = match (value, expected) {
                (Some(actual), serde_json::Value::Number(n)) => value_as_f64(actual)
                    .zip(n.as_f64())
                    .is_some_and(|(a, b)| (a - b).abs() < f64::EPSILON),
                (Some(actual), other) => actual == other,
                (None, _) => false,
            };
            if !ok {
                return false;
            }
        }
        if let Some(expected) = self.has_pii {
            let found = text.as_deref().is_some_and(pii_probe);
            if found != expected {
                return false;
            }
        }
        for (bound, cmp) in [
            (self.gt, f64::gt as fn(&f64, &f64) -> bool),
            (self.lt, f64::lt),
            (self.gte, f64::ge),
            (self.lte, f64::le),
        ] {
            if let Some(b) = bound {
                let ok = value.and_then(value_as_f64).is_some_and(|v| cmp(&v, &b));
                if !ok {
                    return false;
                }
            }
        }
        true
    }
}

/// A regex operator: the pattern as written, plus its compiled form.
/// Serializes as the bare pattern string; compilation happens once, at
/// load-time validation (or lazily for hand-built predicates), so
/// evaluation never parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegexSpec {
    pattern: String,
    #[serde(skip)]
    compiled: OnceLock<Option<regex_lite::Regex>>,
}

impl RegexSpec {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Compile and cache the pattern. A failure is also cached, so a
    /// malformed pattern that slipped past validation never matches.
    fn compile(&self) -> Result<(), String> {
        match regex_lite::Regex::new(&self.pattern) {
            Ok(re) => {
                let _ = self.compiled.set(Some(re));
                Ok(())
            }
            Err(e) => {
                let _ = self.compiled.set(None);
                Err(e.to_string())
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled
            .get_or_init(|| regex_lite::Regex::new(&self.pattern).ok())
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }
}

impl From<&str> for RegexSpec {
    fn from(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            compiled: OnceLock::new(),
        }
    }
}

impl From<String> for RegexSpec {
    fn from(pattern: String) -> Self {
        Self {
            pattern,
            compiled: OnceLock::new(),
        }
    }
}

/// Expected value(s) for a context key: a single spec string or a list
/// meaning "any of". Interpretation (negation, time ranges) belongs to
/// the context evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ContextExpect {
    One(String),
    Many(Vec<String>),
}

impl ContextExpect {
    /// The expected values as a slice-like iterator.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        match self {
            ContextExpect::One(s) => std::slice::from_ref(s).iter().map(String::as_str),
            ContextExpect::Many(v) => v.as_slice().iter().map(String::as_str),
        }
    }
}

/// One temporal condition: "tool X occurred at least `min_count` times
/// within `within_seconds` of now", optionally filtered by the verdict
/// the prior call received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainCondition {
    pub tool: String,
    pub within_seconds: u64,
    #[serde(default = "default_min_count")]
    pub min_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

fn default_min_count() -> u64 {
    1
}

impl ChainCondition {
    fn validate(&self, rule_id: &str) -> RuleResult<()> {
        if self.tool.is_empty() {
            return Err(RuleError::InvalidRule {
                id: rule_id.into(),
                reason: "chain condition tool name cannot be empty".into(),
            });
        }
        if self.within_seconds == 0 {
            return Err(RuleError::InvalidRule {
                id: rule_id.into(),
                reason: "chain condition within_seconds must be positive".into(),
            });
        }
        if self.min_count == 0 {
            return Err(RuleError::InvalidRule {
                id: rule_id.into(),
                reason: "chain condition min_count must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Resolve a dotted path (`config.mode`) inside a JSON value.
pub fn lookup_path<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

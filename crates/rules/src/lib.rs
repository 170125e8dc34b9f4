//! Declarative shield rules — the policy vocabulary for agent tool calls.
//!
//! Rules let operators define guardrails for tool invocations via TOML
//! config. Each rule combines a condition tree (`when`) with a verdict
//! (`then`), enforcing policies like:
//!
//! - "Block `send_email` if `read_file` ran within the last 5 minutes"
//! - "Redact any argument that carries a credit card number"
//! - "Require approval for shell commands outside business hours"
//! - "Block a tool after its 20th call in a session"
//!
//! # Example Rule
//!
//! ```toml
//! shield_name = "default"
//! version = "1"
//! default_verdict = "allow"
//!
//! [[rules]]
//! id = "no-exfil-after-read"
//! description = "Block outgoing mail shortly after file reads"
//! then = "block"
//! message = "Blocked: send_email too soon after read_file"
//! severity = "high"
//! priority = 100
//!
//! [rules.when]
//! tool = "send_email"
//!
//! [[rules.when.chain]]
//! tool = "read_file"
//! within_seconds = 300
//! ```
//!
//! Conditions are parsed once at load time into a typed AST
//! ([`WhenClause`]) and validated exhaustively: duplicate ids, empty
//! predicates, and malformed regexes are all load-time errors, so a rule
//! set that loads is a rule set that evaluates.

mod conditions;
mod model;
mod verify;

pub use conditions::{
    ArgPredicate, ChainCondition, ContextExpect, RegexSpec, ToolPattern, WhenClause, lookup_path,
};
pub use model::{DEFAULT_OUTGOING_TOOLS, Rule, RuleSet, TaintChainConfig};
pub use verify::{sign, verify_signature};

/// Result alias for rule loading and validation.
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Errors from the rule subsystem. Raised at load/reload time only;
/// a loaded rule set never fails at evaluation time.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("duplicate rule id '{id}'")]
    DuplicateId { id: String },

    #[error("invalid regex in rule '{id}', field '{field}': {detail}")]
    InvalidRegex {
        id: String,
        field: String,
        detail: String,
    },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("rule source is not valid UTF-8")]
    InvalidEncoding,

    #[error("rule file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

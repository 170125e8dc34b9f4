//! The policy engine: matches tool calls against the active rule set,
//! builds verdicts, maintains per-session state, and enforces the PII
//! taint chain.
//!
//! The entry point is [`ShieldEngine`]: construct it from a
//! [`RuleSet`](toolshield_rules::RuleSet) and an [`EngineConfig`], then
//! call [`check`](ShieldEngine::check) before each tool invocation and
//! [`post_check`](ShieldEngine::post_check) on each tool's output.
//!
//! ```
//! use serde_json::json;
//! use toolshield_engine::{EngineConfig, ShieldEngine};
//! use toolshield_rules::RuleSet;
//!
//! let rules = RuleSet::from_toml(r#"
//! [[rules]]
//! id = "no-prod-deploys"
//! then = "block"
//! message = "Blocked: production deploys are manual"
//! [rules.when]
//! tool = "deploy"
//! [rules.when.args.env]
//! equals = "prod"
//! "#).unwrap();
//!
//! let engine = ShieldEngine::new(rules, EngineConfig::default()).unwrap();
//! let result = engine.check("deploy", &json!({"env": "prod"}), "session-1", None);
//! assert_eq!(result.verdict, toolshield_core::Verdict::Block);
//! ```

mod chain;
mod context;
mod matcher;
mod shield;
mod verdict;

pub use context::ContextEvaluator;
pub use shield::{EngineConfig, EnforcementMode, PII_TAINT_RULE_ID, ShieldEngine};

pub use toolshield_core::{ShieldResult, Verdict};

//! The shield engine: orchestration, enforcement modes, taint
//! fast-path, atomic rule reload, and the fail-open/fail-closed policy.

use crate::context::ContextEvaluator;
use crate::matcher::{CallView, MatcherEngine, session_keys};
use crate::verdict;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use toolshield_core::{
    ApprovalBackend, Error, PiiType, Result, RuleSourceFetcher, ShieldResult, TraceRecord,
    TraceSink, Verdict,
};
use toolshield_pii::PiiDetector;
use toolshield_rules::{RuleSet, verify_signature};
use toolshield_session::{SessionStore, SessionStoreConfig, SessionStoreStats};
use tracing::{debug, info, warn};

/// Synthetic rule id reported when the taint fast-path blocks a call.
pub const PII_TAINT_RULE_ID: &str = "__pii_taint__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Verdicts take effect.
    #[default]
    Enforce,
    /// Verdicts are computed but downgraded to allow before returning.
    Audit,
    /// Pass-through: always allow, no session mutation.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: EnforcementMode,
    /// On an internal evaluation failure: allow (true) or block (false).
    pub fail_open: bool,
    /// Fixed offset east of UTC, in minutes, for time/day conditions.
    pub utc_offset_minutes: i32,
    pub max_sessions: usize,
    pub session_ttl_seconds: u64,
    pub ring_capacity: usize,
    /// Extra PII patterns, name -> regex, reported as `custom:<name>`.
    pub custom_pii_patterns: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EnforcementMode::Enforce,
            fail_open: false,
            utc_offset_minutes: 0,
            max_sessions: 10_000,
            session_ttl_seconds: 3_600,
            ring_capacity: 128,
            custom_pii_patterns: BTreeMap::new(),
        }
    }
}

pub struct ShieldEngine {
    config: EngineConfig,
    rules: RwLock<Arc<RuleSet>>,
    sessions: SessionStore,
    detector: PiiDetector,
    matcher: MatcherEngine,
    sinks: Vec<Box<dyn TraceSink>>,
    approval: Option<Box<dyn ApprovalBackend>>,
    #[cfg(test)]
    inject_fault: std::sync::atomic::AtomicBool,
}

impl ShieldEngine {
    pub fn new(ruleset: RuleSet, config: EngineConfig) -> Result<Self> {
        ruleset.validate().map_err(config_error)?;
        let mut detector = PiiDetector::new();
        for (name, pattern) in &config.custom_pii_patterns {
            detector.add_custom(name, pattern)?;
        }
        let sessions = SessionStore::new(SessionStoreConfig {
            max_sessions: config.max_sessions,
            ttl_seconds: config.session_ttl_seconds,
            ring_capacity: config.ring_capacity,
            ..SessionStoreConfig::default()
        });
        let matcher = MatcherEngine::new(ContextEvaluator::new(config.utc_offset_minutes));
        info!(
            shield = %ruleset.shield_name,
            rules = ruleset.rules.len(),
            mode = ?config.mode,
            "shield engine initialized"
        );
        Ok(Self {
            config,
            rules: RwLock::new(Arc::new(ruleset)),
            sessions,
            detector,
            matcher,
            sinks: Vec::new(),
            approval: None,
            #[cfg(test)]
            inject_fault: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_approval_backend(mut self, backend: Box<dyn ApprovalBackend>) -> Self {
        self.approval = Some(backend);
        self
    }

    pub fn mode(&self) -> EnforcementMode {
        self.config.mode
    }

    /// Evaluate a tool call. Never panics and never returns an error:
    /// any internal failure is reduced to a safe verdict according to
    /// the `fail_open` policy.
    pub fn check(
        &self,
        tool: &str,
        args: &Value,
        session_id: &str,
        sender: Option<&str>,
    ) -> ShieldResult {
        if self.config.mode == EnforcementMode::Disabled {
            return ShieldResult::allow(args.clone());
        }
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate(tool, args, session_id, sender, start)
        }));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => self.fail_verdict(tool, session_id, args, &err.to_string(), start),
            Err(_) => self.fail_verdict(tool, session_id, args, "evaluation panicked", start),
        }
    }

    fn evaluate(
        &self,
        tool: &str,
        args: &Value,
        session_id: &str,
        sender: Option<&str>,
        start: Instant,
    ) -> Result<ShieldResult> {
        let rules = Arc::clone(&self.rules.read().unwrap());
        let session = self.sessions.get_or_create(session_id);

        #[cfg(test)]
        if self.inject_fault.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(Error::Evaluation("injected matcher fault".into()));
        }

        let mut result = if rules.taint_chain_enabled()
            && session.pii_tainted
            && rules.is_outgoing_tool(tool)
        {
            debug!(session_id, tool, "taint fast-path block");
            ShieldResult {
                verdict: Verdict::Block,
                rule_id: Some(PII_TAINT_RULE_ID.to_string()),
                message: if session.taint_details.is_empty() {
                    "Blocked: session is PII-tainted".to_string()
                } else {
                    format!("Blocked: {}", session.taint_details)
                },
                pii_matches: Vec::new(),
                original_args: args.clone(),
                modified_args: None,
                approval: None,
            }
        } else {
            let keys = session_keys(&session);
            let events = session.events.snapshot();
            let mut context = HashMap::new();
            if let Some(sender) = sender {
                context.insert("sender".to_string(), sender.to_string());
            }
            let view = CallView {
                tool,
                args,
                session_keys: &keys,
                events: &events,
                context: &context,
                now: Utc::now(),
            };
            let probe = |text: &str| self.detector.has_pii(text);
            let matched = self.matcher.find_best_match(&rules, &view, &probe);
            if let Some(rule) = matched {
                match rule.then {
                    Verdict::Block | Verdict::Approve => warn!(
                        session_id, tool, rule = %rule.id, verdict = %rule.then,
                        severity = ?rule.severity, "rule fired"
                    ),
                    Verdict::Redact => info!(
                        session_id, tool, rule = %rule.id,
                        severity = ?rule.severity, "rule fired; redacting"
                    ),
                    Verdict::Allow => {
                        debug!(session_id, tool, rule = %rule.id, "rule fired; allowing")
                    }
                }
            }
            verdict::build(
                matched,
                rules.default_verdict,
                &self.detector,
                session_id,
                tool,
                args,
            )
        };

        if self.config.mode == EnforcementMode::Audit && result.verdict != Verdict::Allow {
            result.message = format!("[audit] would {}: {}", result.verdict, result.message);
            result.verdict = Verdict::Allow;
            result.modified_args = None;
            result.approval = None;
        }

        // the ring buffer records the effective verdict, since that is
        // what actually happened
        let summary = serde_json::to_string(args).unwrap_or_default();
        self.sessions
            .record_call(session_id, tool, result.verdict, &summary);

        if let Some(approval) = &result.approval
            && let Some(backend) = &self.approval
        {
            backend.submit(approval);
        }

        self.trace(session_id, tool, &result, start);
        Ok(result)
    }

    /// Scan a tool's *output* for PII and fold the findings into the
    /// session's taint state. Never blocks anything itself; it only
    /// arms state the taint fast-path consults on later checks.
    pub fn post_check(&self, tool: &str, result: &Value, session_id: &str) {
        if self.config.mode == EnforcementMode::Disabled {
            return;
        }
        let matches = self.detector.scan_value(result);
        if matches.is_empty() {
            return;
        }
        let types: BTreeSet<PiiType> = matches.iter().map(|m| m.pii_type.clone()).collect();
        let rules = Arc::clone(&self.rules.read().unwrap());
        self.sessions.get_or_create(session_id);
        if rules.taint_chain_enabled() {
            info!(session_id, tool, types = ?types, "PII in tool output; tainting session");
            self.sessions.mark_tainted(session_id, types);
        } else {
            self.sessions.merge_taints(session_id, types);
        }
    }

    /// Disarm the taint gate for a session.
    pub fn clear_taint(&self, session_id: &str) {
        self.sessions.clear_taint(session_id);
    }

    pub fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id)
    }

    /// Parse and validate a new rule source, then atomically swap it
    /// in. On any failure the previous rule set stays active.
    pub fn reload_rules(&self, source: &str) -> Result<()> {
        let new = RuleSet::from_toml(source).map_err(config_error)?;
        self.activate(new);
        Ok(())
    }

    /// Reload from raw bytes after verifying a base64 HMAC-SHA256
    /// signature over them.
    pub fn reload_rules_signed(&self, bytes: &[u8], signature: &str, key: &[u8]) -> Result<()> {
        verify_signature(bytes, signature, key).map_err(config_error)?;
        let new = RuleSet::from_slice(bytes).map_err(config_error)?;
        self.activate(new);
        Ok(())
    }

    /// Pull rule bytes from a fetcher. When a signing key is configured
    /// the source must carry a valid signature.
    pub fn reload_from_fetcher(
        &self,
        fetcher: &dyn RuleSourceFetcher,
        key: Option<&[u8]>,
    ) -> Result<()> {
        let (bytes, signature) = fetcher.fetch().map_err(|e| Error::Config {
            message: format!("rule fetch failed: {e}"),
        })?;
        match (signature, key) {
            (Some(sig), Some(key)) => self.reload_rules_signed(&bytes, &sig, key),
            (None, Some(_)) => Err(Error::Config {
                message: "rule source is unsigned but a signing key is configured".to_string(),
            }),
            _ => {
                let new = RuleSet::from_slice(&bytes).map_err(config_error)?;
                self.activate(new);
                Ok(())
            }
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().unwrap().rules.len()
    }

    pub fn session_stats(&self) -> SessionStoreStats {
        self.sessions.stats()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn activate(&self, new: RuleSet) {
        info!(shield = %new.shield_name, rules = new.rules.len(), "rule set reloaded");
        *self.rules.write().unwrap() = Arc::new(new);
    }

    fn fail_verdict(
        &self,
        tool: &str,
        session_id: &str,
        args: &Value,
        detail: &str,
        start: Instant,
    ) -> ShieldResult {
        let result = if self.config.fail_open {
            warn!(tool, session_id, detail, "evaluation failed; failing open");
            ShieldResult::allow(args.clone())
        } else {
            warn!(tool, session_id, detail, "evaluation failed; failing closed");
            ShieldResult {
                verdict: Verdict::Block,
                rule_id: None,
                message: "Blocked: internal policy evaluation error".to_string(),
                pii_matches: Vec::new(),
                original_args: args.clone(),
                modified_args: None,
                approval: None,
            }
        };
        // failed checks still reach the sinks; logs and traces are the
        // only place a fail-open failure is visible
        self.trace(session_id, tool, &result, start);
        result
    }

    fn trace(&self, session_id: &str, tool: &str, result: &ShieldResult, start: Instant) {
        if self.sinks.is_empty() {
            return;
        }
        let mut pii_types: Vec<PiiType> =
            result.pii_matches.iter().map(|m| m.pii_type.clone()).collect();
        pii_types.sort();
        pii_types.dedup();
        let record = TraceRecord {
            session_id: session_id.to_string(),
            tool: tool.to_string(),
            verdict: result.verdict,
            rule_id: result.rule_id.clone(),
            pii_types,
            latency_ms: start.elapsed().as_secs_f64() * 1_000.0,
        };
        for sink in &self.sinks {
            sink.record(&record);
        }
    }
}

fn config_error(e: toolshield_rules::RuleError) -> Error {
    Error::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use toolshield_core::ApprovalRequest;

    const RULES: &str = r#"
shield_name = "test"

[[rules]]
id = "no-rm-rf"
then = "block"
message = "Blocked: destructive command"
priority = 100
[rules.when]
tool = "shell"
[rules.when.args.command]
contains = "rm -rf"

[[rules]]
id = "redact-email-body"
then = "redact"
message = "Arguments redacted"
[rules.when]
tool = "send_email"
[rules.when.args.body]
has_pii = true

[[rules]]
id = "approve-deploy"
then = "approve"
message = "Deploys need a human"
[rules.when]
tool = "deploy"
"#;

    fn engine(toml: &str) -> ShieldEngine {
        engine_with(toml, EngineConfig::default())
    }

    fn engine_with(toml: &str, config: EngineConfig) -> ShieldEngine {
        ShieldEngine::new(RuleSet::from_toml(toml).unwrap(), config).unwrap()
    }

    #[test]
    fn block_rule_fires() {
        let engine = engine(RULES);
        let result = engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Block);
        assert_eq!(result.rule_id.as_deref(), Some("no-rm-rf"));
        assert_eq!(result.message, "Blocked: destructive command");
    }

    #[test]
    fn unmatched_call_allows() {
        let engine = engine(RULES);
        let result = engine.check("shell", &json!({"command": "ls"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Allow);
        assert!(result.rule_id.is_none());
    }

    #[test]
    fn default_verdict_applies_when_unmatched() {
        let engine = engine("default_verdict = \"block\"");
        let result = engine.check("anything", &json!({}), "s1", None);
        assert_eq!(result.verdict, Verdict::Block);
        assert!(result.rule_id.is_none());
    }

    #[test]
    fn redact_rule_modifies_args() {
        let engine = engine(RULES);
        let args = json!({"body": "reach ivan@example.com"});
        let result = engine.check("send_email", &args, "s1", None);
        assert_eq!(result.verdict, Verdict::Redact);
        let modified = result.modified_args.unwrap();
        assert!(!modified["body"].as_str().unwrap().contains('@'));
        assert_eq!(result.original_args, args);
    }

    #[test]
    fn approve_rule_notifies_backend() {
        struct Collecting(Arc<Mutex<Vec<ApprovalRequest>>>);
        impl ApprovalBackend for Collecting {
            fn submit(&self, request: &ApprovalRequest) {
                self.0.lock().unwrap().push(request.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine =
            engine(RULES).with_approval_backend(Box::new(Collecting(Arc::clone(&seen))));

        let result = engine.check("deploy", &json!({"env": "prod"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Approve);
        assert!(result.approval.is_some());
        let submitted = seen.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].rule_id, "approve-deploy");
    }

    #[test]
    fn audit_mode_downgrades_but_records() {
        let config = EngineConfig {
            mode: EnforcementMode::Audit,
            ..EngineConfig::default()
        };
        let engine = engine_with(RULES, config);
        let result = engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Allow);
        assert_eq!(result.rule_id.as_deref(), Some("no-rm-rf"));
        assert!(result.message.contains("[audit] would block"));

        // the ring buffer saw the effective verdict
        let session = engine.sessions.get("s1").unwrap();
        let events = session.events.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].verdict, Verdict::Allow);
    }

    #[test]
    fn disabled_mode_is_a_no_op() {
        let config = EngineConfig {
            mode: EnforcementMode::Disabled,
            ..EngineConfig::default()
        };
        let engine = engine_with(RULES, config);
        let result = engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Allow);
        assert!(engine.sessions.get("s1").is_none());

        engine.post_check("shell", &json!({"out": "mail x@example.com"}), "s1");
        assert!(engine.sessions.get("s1").is_none());
    }

    #[test]
    fn taint_fast_path_blocks_outgoing_tools() {
        // no rules at all; taint chain is on by default
        let engine = engine("");
        engine.post_check(
            "read_file",
            &json!({"content": "ssn 123-45-6789"}),
            "s1",
        );

        let blocked = engine.check("send_message", &json!({"text": "hi"}), "s1", None);
        assert_eq!(blocked.verdict, Verdict::Block);
        assert_eq!(blocked.rule_id.as_deref(), Some(PII_TAINT_RULE_ID));
        assert!(blocked.message.contains("ssn"));

        // non-outgoing tools are unaffected
        let read = engine.check("read_file", &json!({}), "s1", None);
        assert_eq!(read.verdict, Verdict::Allow);

        engine.clear_taint("s1");
        let after = engine.check("send_message", &json!({"text": "hi"}), "s1", None);
        assert_eq!(after.verdict, Verdict::Allow);
    }

    #[test]
    fn taint_does_not_cross_sessions() {
        let engine = engine("");
        engine.post_check("read_file", &json!({"x": "call +14155552671"}), "tainted");

        let other = engine.check("send_message", &json!({}), "clean", None);
        assert_eq!(other.verdict, Verdict::Allow);
        let same = engine.check("send_message", &json!({}), "tainted", None);
        assert_eq!(same.verdict, Verdict::Block);
    }

    #[test]
    fn taint_chain_opt_out() {
        let engine = engine("[taint_chain]\nenabled = false");
        engine.post_check("read_file", &json!({"x": "mail j@example.com"}), "s1");
        let result = engine.check("send_message", &json!({}), "s1", None);
        assert_eq!(result.verdict, Verdict::Allow);
        // the type history is still recorded
        let session = engine.sessions.get("s1").unwrap();
        assert!(!session.taints.is_empty());
        assert!(!session.pii_tainted);
    }

    #[test]
    fn chain_rule_correlates_within_session_only() {
        let toml = r#"
[[rules]]
id = "exfil-guard"
then = "block"
message = "read_file then send_email looks like exfiltration"
[rules.when]
tool = "send_email"
[[rules.when.chain]]
tool = "read_file"
within_seconds = 300
"#;
        let engine = engine(toml);
        engine.check("read_file", &json!({"path": "/etc/passwd"}), "s1", None);

        let same = engine.check("send_email", &json!({"to": "x"}), "s1", None);
        assert_eq!(same.verdict, Verdict::Block);
        assert_eq!(same.rule_id.as_deref(), Some("exfil-guard"));

        let other = engine.check("send_email", &json!({"to": "x"}), "s2", None);
        assert_eq!(other.verdict, Verdict::Allow);
    }

    #[test]
    fn sender_is_exposed_as_context_key() {
        let toml = r#"
[[rules]]
id = "untrusted-sender"
then = "block"
[rules.when]
tool = "shell"
[rules.when.context]
sender = "untrusted"
"#;
        let engine = engine(toml);
        let blocked = engine.check("shell", &json!({}), "s1", Some("untrusted"));
        assert_eq!(blocked.verdict, Verdict::Block);
        let allowed = engine.check("shell", &json!({}), "s1", Some("trusted"));
        assert_eq!(allowed.verdict, Verdict::Allow);
        let absent = engine.check("shell", &json!({}), "s1", None);
        assert_eq!(absent.verdict, Verdict::Allow);
    }

    #[test]
    fn reload_is_atomic() {
        let engine = engine(RULES);
        assert_eq!(engine.rule_count(), 3);

        let err = engine.reload_rules("[[rules]]\nid = \"dup\"\n[[rules]]\nid = \"dup\"");
        assert!(err.is_err());
        assert_eq!(engine.rule_count(), 3);
        // previous behavior intact
        let result = engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Block);

        engine
            .reload_rules("[[rules]]\nid = \"only\"\nthen = \"allow\"")
            .unwrap();
        assert_eq!(engine.rule_count(), 1);
        let after = engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(after.verdict, Verdict::Allow);
    }

    #[test]
    fn signed_reload_verifies_signature() {
        let engine = engine(RULES);
        let source = b"[[rules]]\nid = \"signed\"\nthen = \"block\"\n[rules.when]\ntool = \"shell\"";
        let key = b"signing-key";
        let sig = toolshield_rules::sign(source, key);

        assert!(engine.reload_rules_signed(source, &sig, b"wrong-key").is_err());
        assert_eq!(engine.rule_count(), 3);

        engine.reload_rules_signed(source, &sig, key).unwrap();
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn fetcher_reload_paths() {
        struct StaticFetcher {
            bytes: Vec<u8>,
            signature: Option<String>,
        }
        impl RuleSourceFetcher for StaticFetcher {
            fn fetch(&self) -> std::io::Result<(Vec<u8>, Option<String>)> {
                Ok((self.bytes.clone(), self.signature.clone()))
            }
        }

        let engine = engine(RULES);
        let source = b"[[rules]]\nid = \"fetched\"\nthen = \"allow\"".to_vec();
        let key = b"k";

        // unsigned source rejected when a key is configured
        let unsigned = StaticFetcher {
            bytes: source.clone(),
            signature: None,
        };
        assert!(engine.reload_from_fetcher(&unsigned, Some(key)).is_err());
        assert_eq!(engine.rule_count(), 3);

        let signed = StaticFetcher {
            bytes: source.clone(),
            signature: Some(toolshield_rules::sign(&source, key)),
        };
        engine.reload_from_fetcher(&signed, Some(key)).unwrap();
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn fail_open_and_fail_closed() {
        let open = engine_with(
            RULES,
            EngineConfig {
                fail_open: true,
                ..EngineConfig::default()
            },
        );
        open.inject_fault.store(true, Ordering::Relaxed);
        let result = open.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Allow);

        let closed = engine_with(
            RULES,
            EngineConfig {
                fail_open: false,
                ..EngineConfig::default()
            },
        );
        closed.inject_fault.store(true, Ordering::Relaxed);
        let result = closed.check("shell", &json!({"command": "ls"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Block);
        assert!(result.rule_id.is_none());
        // generic message, no internals leaked
        assert_eq!(result.message, "Blocked: internal policy evaluation error");
    }

    #[test]
    fn eviction_bound_holds_through_engine() {
        let engine = engine_with(
            RULES,
            EngineConfig {
                max_sessions: 4,
                ..EngineConfig::default()
            },
        );
        for i in 0..20 {
            engine.check("shell", &json!({"command": "ls"}), &format!("s{i}"), None);
        }
        assert!(engine.session_stats().active_sessions <= 4);
    }

    #[test]
    fn trace_sink_receives_every_check() {
        struct Collecting(Arc<Mutex<Vec<TraceRecord>>>);
        impl TraceSink for Collecting {
            fn record(&self, record: &TraceRecord) {
                self.0.lock().unwrap().push(record.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(RULES).with_trace_sink(Box::new(Collecting(Arc::clone(&seen))));

        engine.check("shell", &json!({"command": "rm -rf /"}), "s1", None);
        engine.check("shell", &json!({"command": "ls"}), "s1", None);

        let records = seen.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].verdict, Verdict::Block);
        assert_eq!(records[0].rule_id.as_deref(), Some("no-rm-rf"));
        assert_eq!(records[1].verdict, Verdict::Allow);
    }

    #[test]
    fn trace_sink_sees_failed_checks() {
        struct Collecting(Arc<Mutex<Vec<TraceRecord>>>);
        impl TraceSink for Collecting {
            fn record(&self, record: &TraceRecord) {
                self.0.lock().unwrap().push(record.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(RULES).with_trace_sink(Box::new(Collecting(Arc::clone(&seen))));
        engine.inject_fault.store(true, Ordering::Relaxed);

        let result = engine.check("shell", &json!({"command": "ls"}), "s1", None);
        assert_eq!(result.verdict, Verdict::Block);

        // the failed evaluation is still observable through the sink
        let records = seen.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verdict, Verdict::Block);
        assert!(records[0].rule_id.is_none());
    }

    #[test]
    fn session_counters_grow_per_check() {
        let engine = engine(RULES);
        for _ in 0..3 {
            engine.check("shell", &json!({"command": "ls"}), "s1", None);
        }
        let session = engine.sessions.get("s1").unwrap();
        assert_eq!(session.total_calls, 3);
        assert_eq!(session.tool_count("shell"), 3);
    }

    #[test]
    fn custom_pii_pattern_flows_into_detection() {
        let mut config = EngineConfig::default();
        config
            .custom_pii_patterns
            .insert("badge".to_string(), r"\bEMP-\d{6}\b".to_string());
        let engine = engine_with(RULES, config);

        let result = engine.check(
            "send_email",
            &json!({"body": "my badge is EMP-114217"}),
            "s1",
            None,
        );
        assert_eq!(result.verdict, Verdict::Redact);
        assert!(
            result
                .pii_matches
                .iter()
                .any(|m| m.pii_type == PiiType::Custom("badge".into()))
        );
    }
}

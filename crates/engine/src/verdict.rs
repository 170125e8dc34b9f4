//! Turns a matched rule plus PII scan results into a `ShieldResult`.
//!
//! Block results keep the original arguments for audit but never carry
//! a redacted copy; redact results do the actual redaction; approve
//! results carry the descriptor handed to the approval backend.

use serde_json::Value;
use toolshield_core::{ApprovalRequest, ShieldResult, Verdict};
use toolshield_pii::PiiDetector;
use toolshield_rules::Rule;

pub(crate) fn build(
    rule: Option<&Rule>,
    default_verdict: Verdict,
    detector: &PiiDetector,
    session_id: &str,
    tool: &str,
    args: &Value,
) -> ShieldResult {
    let (verdict, rule_id, message) = match rule {
        Some(r) => (r.then, Some(r.id.clone()), r.display_message()),
        None => (default_verdict, None, default_message(default_verdict)),
    };

    match verdict {
        Verdict::Allow | Verdict::Block => ShieldResult {
            verdict,
            rule_id,
            message,
            pii_matches: detector.scan_value(args),
            original_args: args.clone(),
            modified_args: None,
            approval: None,
        },
        Verdict::Redact => {
            let (redacted, matches) = detector.redact(args);
            ShieldResult {
                verdict,
                rule_id,
                message,
                pii_matches: matches,
                original_args: args.clone(),
                modified_args: Some(redacted),
                approval: None,
            }
        }
        Verdict::Approve => {
            let approval = ApprovalRequest::new(
                session_id,
                tool,
                args.clone(),
                rule_id.as_deref().unwrap_or("default_verdict"),
                &message,
            );
            ShieldResult {
                verdict,
                rule_id,
                message,
                pii_matches: detector.scan_value(args),
                original_args: args.clone(),
                modified_args: None,
                approval: Some(approval),
            }
        }
    }
}

fn default_message(verdict: Verdict) -> String {
    match verdict {
        Verdict::Allow => String::new(),
        other => format!("No rule matched; default verdict '{other}' applied"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolshield_rules::RuleSet;

    fn rule_with(then: &str) -> Rule {
        let set = RuleSet::from_toml(&format!(
            "[[rules]]\nid = \"r1\"\nthen = \"{then}\"\nmessage = \"because\""
        ))
        .unwrap();
        set.rules[0].clone()
    }

    #[test]
    fn block_reports_pii_but_never_redacts() {
        let detector = PiiDetector::new();
        let args = json!({"body": "mail grace@example.com"});
        let result = build(
            Some(&rule_with("block")),
            Verdict::Allow,
            &detector,
            "s1",
            "send_email",
            &args,
        );
        assert_eq!(result.verdict, Verdict::Block);
        assert_eq!(result.rule_id.as_deref(), Some("r1"));
        assert_eq!(result.pii_matches.len(), 1);
        assert_eq!(result.original_args, args);
        assert!(result.modified_args.is_none());
    }

    #[test]
    fn redact_populates_modified_args() {
        let detector = PiiDetector::new();
        let args = json!({"body": "mail heidi@example.com"});
        let result = build(
            Some(&rule_with("redact")),
            Verdict::Allow,
            &detector,
            "s1",
            "send_email",
            &args,
        );
        assert_eq!(result.verdict, Verdict::Redact);
        let modified = result.modified_args.unwrap();
        assert!(!modified["body"].as_str().unwrap().contains('@'));
        assert_eq!(result.original_args, args);
    }

    #[test]
    fn approve_carries_descriptor() {
        let detector = PiiDetector::new();
        let args = json!({"command": "deploy"});
        let result = build(
            Some(&rule_with("approve")),
            Verdict::Allow,
            &detector,
            "s1",
            "shell",
            &args,
        );
        assert_eq!(result.verdict, Verdict::Approve);
        let approval = result.approval.unwrap();
        assert_eq!(approval.tool, "shell");
        assert_eq!(approval.rule_id, "r1");
        assert_eq!(approval.message, "because");
    }

    #[test]
    fn unmatched_applies_default_verdict() {
        let detector = PiiDetector::new();
        let args = json!({});
        let allow = build(None, Verdict::Allow, &detector, "s1", "shell", &args);
        assert_eq!(allow.verdict, Verdict::Allow);
        assert!(allow.rule_id.is_none());
        assert!(allow.message.is_empty());

        let block = build(None, Verdict::Block, &detector, "s1", "shell", &args);
        assert_eq!(block.verdict, Verdict::Block);
        assert!(block.rule_id.is_none());
        assert!(block.message.contains("default verdict"));
    }
}

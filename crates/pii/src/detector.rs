//! Pattern-based PII detection and structural redaction.
//!
//! Each pattern pairs a regex with an optional secondary validator;
//! a match is only reported when the validator accepts it. Scanning
//! and redaction are pure functions over their inputs.

use crate::validators;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use toolshield_core::{Error, PiiMatch, PiiType, Result};
use tracing::warn;

/// Characters kept visible on each side of a masked value.
pub const DEFAULT_EDGE_CHARS: usize = 2;

const MIN_MATCH_LEN: usize = 3;

struct PiiPattern {
    pii_type: PiiType,
    regex: Regex,
    validator: Option<fn(&str) -> bool>,
}

/// Mask `text`, keeping `edge_chars` characters visible on each side.
/// Strings of `2 * edge_chars` characters or fewer are fully masked.
pub fn mask(text: &str, edge_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= edge_chars * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..edge_chars].iter().collect();
    let tail: String = chars[chars.len() - edge_chars..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - edge_chars * 2))
}

pub struct PiiDetector {
    patterns: Vec<PiiPattern>,
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiDetector {
    /// Build a detector with the built-in pattern set.
    pub fn new() -> Self {
        let mut detector = Self {
            patterns: Vec::new(),
        };
        detector.register_defaults();
        detector
    }

    fn add_pattern(
        &mut self,
        pii_type: PiiType,
        pattern: &str,
        validator: Option<fn(&str) -> bool>,
    ) {
        match Regex::new(pattern) {
            Ok(regex) => self.patterns.push(PiiPattern {
                pii_type,
                regex,
                validator,
            }),
            Err(e) => warn!(pii_type = %pii_type, "failed to compile PII pattern: {e}"),
        }
    }

    fn register_defaults(&mut self) {
        self.add_pattern(
            PiiType::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            None,
        );
        // E.164 international, then common US grouping
        self.add_pattern(PiiType::Phone, r"\+[1-9]\d{6,14}\b", None);
        self.add_pattern(
            PiiType::Phone,
            r"\b\(?\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b",
            None,
        );
        // 13-19 digits, optionally separated; the Luhn validator does
        // the false-positive suppression, not the pattern
        self.add_pattern(
            PiiType::CreditCard,
            r"\b(?:\d[\s-]?){12,18}\d\b",
            Some(validators::validate_credit_card),
        );
        self.add_pattern(
            PiiType::Ssn,
            r"\b\d{3}-\d{2}-\d{4}\b",
            Some(validators::validate_ssn),
        );
        self.add_pattern(
            PiiType::Iban,
            r"\b[A-Z]{2}\d{2}\s?[\dA-Z]{4}\s?[\dA-Z]{4}\s?[\dA-Z]{4}(?:\s?[\dA-Z]{2,4}){0,5}\b",
            Some(validators::validate_iban),
        );
        self.add_pattern(
            PiiType::IpAddress,
            r"\b(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b",
            None,
        );
        self.add_pattern(
            PiiType::Passport,
            r"(?i)passport\s*(?:no|number|#|num)?\s*[.:=]?\s*([A-Z0-9]{6,12})\b",
            None,
        );
        self.add_pattern(
            PiiType::DateOfBirth,
            r"\b\d{1,4}[/.\-]\d{1,2}[/.\-]\d{1,4}\b",
            Some(validators::validate_dob),
        );
        // 10- or 12-digit national id forms, checksum-gated
        self.add_pattern(
            PiiType::NationalId,
            r"\b\d{10}(?:\d{2})?\b",
            Some(validators::validate_national_id),
        );
    }

    /// Register a caller-supplied pattern reported as `custom:<name>`.
    pub fn add_custom(&mut self, name: &str, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| Error::Config {
            message: format!("invalid custom PII pattern '{name}': {e}"),
        })?;
        self.patterns.push(PiiPattern {
            pii_type: PiiType::Custom(name.to_string()),
            regex,
            validator: None,
        });
        Ok(())
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Scan a single string. `field` is carried through into each match
    /// so callers can report where in a structure the hit occurred.
    pub fn scan(&self, text: &str, field: &str) -> Vec<PiiMatch> {
        let mut found = Vec::new();
        for pat in &self.patterns {
            for cap in pat.regex.captures_iter(text) {
                let Some(m) = cap.get(1).or_else(|| cap.get(0)) else {
                    continue;
                };
                if m.len() < MIN_MATCH_LEN {
                    continue;
                }
                if let Some(validate) = pat.validator
                    && !validate(m.as_str())
                {
                    continue;
                }
                found.push(PiiMatch {
                    pii_type: pat.pii_type.clone(),
                    field: field.to_string(),
                    start: m.start(),
                    end: m.end(),
                    masked_value: mask(m.as_str(), DEFAULT_EDGE_CHARS),
                });
            }
        }
        found.sort_by_key(|m| (m.start, m.end));
        found
    }

    /// Whether any pattern matches anywhere in `text`.
    pub fn has_pii(&self, text: &str) -> bool {
        !self.scan(text, "").is_empty()
    }

    /// Recurse through nested maps and lists, scanning every string leaf.
    /// Field paths use dots for map keys and brackets for list indices,
    /// e.g. `config.recipients[2]`.
    pub fn scan_value(&self, value: &Value) -> Vec<PiiMatch> {
        let mut found = Vec::new();
        self.walk(value, "", &mut found);
        found
    }

    fn walk(&self, value: &Value, path: &str, out: &mut Vec<PiiMatch>) {
        match value {
            Value::String(s) => out.extend(self.scan(s, path)),
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.walk(child, &child_path, out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    self.walk(child, &format!("{path}[{i}]"), out);
                }
            }
            _ => {}
        }
    }

    /// Produce a redacted copy of `value` along with everything found.
    /// Spans within a string are replaced highest-offset first so earlier
    /// replacements never shift later offsets; masked text is written
    /// back through the same field path the scan reported.
    pub fn redact(&self, value: &Value) -> (Value, Vec<PiiMatch>) {
        let matches = self.scan_value(value);
        let mut redacted = value.clone();

        let mut by_field: BTreeMap<&str, Vec<&PiiMatch>> = BTreeMap::new();
        for m in &matches {
            by_field.entry(m.field.as_str()).or_default().push(m);
        }

        for (field, mut field_matches) in by_field {
            let segments = parse_path(field);
            let Some(Value::String(text)) = value_at_mut(&mut redacted, &segments) else {
                continue;
            };
            field_matches.sort_by(|a, b| b.start.cmp(&a.start));
            let mut last_start = usize::MAX;
            for m in field_matches {
                // skip anything overlapping an already-replaced span
                if m.end > last_start {
                    continue;
                }
                text.replace_range(m.start..m.end, &m.masked_value);
                last_start = m.start;
            }
        }

        (redacted, matches)
    }
}

// ── Field paths ──────────────────────────────────────────────────────

enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(bracket) = rest.find('[') {
            if bracket > 0 {
                segments.push(Segment::Key(rest[..bracket].to_string()));
            }
            match rest.find(']') {
                Some(close) => {
                    if let Ok(i) = rest[bracket + 1..close].parse() {
                        segments.push(Segment::Index(i));
                    }
                    rest = &rest[close + 1..];
                }
                None => {
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    segments
}

fn value_at_mut<'a>(root: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            Segment::Index(i) => current.as_array_mut()?.get_mut(*i)?,
        };
    }
    Some(current)
}

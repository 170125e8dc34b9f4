//! Ambient-context condition evaluation.
//!
//! `time_of_day` and `day_of_week` keys are answered from the clock
//! (with a fixed configured UTC offset); every other key is matched
//! against the caller-supplied context map. Malformed time and day
//! specs fail open and log a warning — a typo in one condition must
//! not silently turn a rule into a universal block.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};
use toolshield_rules::ContextExpect;
use tracing::warn;

pub struct ContextEvaluator {
    offset: FixedOffset,
}

impl ContextEvaluator {
    /// `utc_offset_minutes` is the fixed offset east of UTC used for
    /// time and day conditions.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(utc_offset_minutes, "invalid UTC offset; falling back to UTC");
            Utc.fix()
        });
        Self { offset }
    }

    pub fn evaluate(
        &self,
        expects: &BTreeMap<String, ContextExpect>,
        context: &HashMap<String, String>,
    ) -> bool {
        self.evaluate_at(expects, context, Utc::now())
    }

    /// All keys AND-combine; a key with several expected values passes
    /// if any of them passes.
    pub(crate) fn evaluate_at(
        &self,
        expects: &BTreeMap<String, ContextExpect>,
        context: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> bool {
        let local = now.with_timezone(&self.offset);
        expects.iter().all(|(key, expect)| match key.as_str() {
            "time_of_day" => expect.values().any(|spec| time_matches(spec, &local)),
            "day_of_week" => expect.values().any(|spec| day_matches(spec, &local)),
            _ => plain_matches(key, expect, context),
        })
    }
}

/// Exact-equality matching with `!value` negation. A missing context
/// key passes only when every expected value is a negation.
fn plain_matches(key: &str, expect: &ContextExpect, context: &HashMap<String, String>) -> bool {
    match context.get(key) {
        Some(actual) => expect.values().any(|v| match v.strip_prefix('!') {
            Some(negated) => actual != negated,
            None => actual == v,
        }),
        None => expect.values().all(|v| v.starts_with('!')),
    }
}

fn split_negation(spec: &str) -> (bool, &str) {
    match spec.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, spec),
    }
}

/// `"HH:MM-HH:MM"`, inclusive on both ends. Start after end wraps
/// overnight: `22:00-06:00` covers late evening and early morning.
fn time_matches(spec: &str, local: &DateTime<FixedOffset>) -> bool {
    let (negated, body) = split_negation(spec);
    let Some((start, end)) = parse_time_range(body) else {
        warn!(spec, "malformed time_of_day condition; failing open");
        return true;
    };
    let current = local.hour() * 60 + local.minute();
    let inside = if start <= end {
        (start..=end).contains(&current)
    } else {
        current >= start || current <= end
    };
    inside != negated
}

fn parse_time_range(body: &str) -> Option<(u32, u32)> {
    let (start, end) = body.split_once('-')?;
    Some((parse_hhmm(start)?, parse_hhmm(end)?))
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Either a wrapping dash-range over the Mon..Sun week (`Fri-Mon`
/// covers Fri, Sat, Sun, Mon) or a comma list (`Mon,Wed,Fri`).
fn day_matches(spec: &str, local: &DateTime<FixedOffset>) -> bool {
    let (negated, body) = split_negation(spec);
    let today = local.weekday().num_days_from_monday() as usize;
    let Some(inside) = day_spec_contains(body, today) else {
        warn!(spec, "malformed day_of_week condition; failing open");
        return true;
    };
    inside != negated
}

fn day_spec_contains(body: &str, today: usize) -> Option<bool> {
    if let Some((start, end)) = body.split_once('-') {
        let start = parse_day(start)?;
        let end = parse_day(end)?;
        return Some(if start <= end {
            (start..=end).contains(&today)
        } else {
            today >= start || today <= end
        });
    }
    let mut found = false;
    for part in body.split(',') {
        if parse_day(part)? == today {
            found = true;
        }
    }
    Some(found)
}

fn parse_day(s: &str) -> Option<usize> {
    let t = s.trim().to_ascii_lowercase();
    if t.len() < 3 {
        return None;
    }
    ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
        .iter()
        .position(|d| t.starts_with(d))
}

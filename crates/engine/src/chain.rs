//! Temporal correlation over a session's recent events.

use chrono::{DateTime, Duration, Utc};
use toolshield_core::ToolEvent;
use toolshield_rules::ChainCondition;

/// A chain clause holds when every condition is satisfied against the
/// session's event history. `now` is fixed once per check so all
/// conditions measure from the same instant.
pub fn chain_matches(
    conditions: &[ChainCondition],
    events: &[ToolEvent],
    now: DateTime<Utc>,
) -> bool {
    conditions.iter().all(|cond| {
        let cutoff = now - Duration::seconds(cond.within_seconds as i64);
        let count = events
            .iter()
            .filter(|ev| ev.tool == cond.tool)
            .filter(|ev| ev.timestamp >= cutoff)
            .filter(|ev| cond.verdict.is_none_or(|v| ev.verdict == v))
            .count() as u64;
        count >= cond.min_count
    })
}

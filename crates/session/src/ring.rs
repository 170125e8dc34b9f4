//! Fixed-capacity recent-event log.
//!
//! Appends are O(1) and evict the oldest entry when full. Reads copy
//! the buffer out under the lock and filter outside it, so predicate
//! evaluation never holds the lock.

use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use toolshield_core::{ToolEvent, Verdict};

#[derive(Debug)]
pub struct EventRing {
    capacity: usize,
    events: Mutex<VecDeque<ToolEvent>>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Append an event, evicting the oldest when the buffer is full.
    pub fn append(&self, event: ToolEvent) {
        let mut events = self.events.lock().unwrap();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current contents in chronological order.
    pub fn snapshot(&self) -> Vec<ToolEvent> {
        self.events.lock().unwrap().iter().cloned().collect()
    }

    /// Events matching the given filters, in chronological order.
    pub fn query(
        &self,
        tool: Option<&str>,
        within_seconds: Option<u64>,
        verdict: Option<Verdict>,
    ) -> Vec<ToolEvent> {
        let snapshot = self.snapshot();
        let cutoff = within_seconds.map(|s| Utc::now() - Duration::seconds(s as i64));
        snapshot
            .into_iter()
            .filter(|ev| tool.is_none_or(|t| ev.tool == t))
            .filter(|ev| cutoff.is_none_or(|c| ev.timestamp >= c))
            .filter(|ev| verdict.is_none_or(|v| ev.verdict == v))
            .collect()
    }
}

//! TTL + capacity bounded session store.
//!
//! A single store-wide lock serializes all mutation; critical sections
//! are O(1) apart from the amortized expiry sweep. Counters are
//! unbounded, the per-session event ring is capacity-bounded — the two
//! track different things.

use crate::ring::EventRing;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use toolshield_core::{PiiType, ToolEvent, Verdict};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Hard cap on concurrently tracked sessions.
    pub max_sessions: usize,
    /// Sessions expire this many seconds after creation.
    pub ttl_seconds: u64,
    /// Event ring capacity per session.
    pub ring_capacity: usize,
    /// Run an expiry sweep every this many store operations.
    pub sweep_interval: u64,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            ttl_seconds: 3_600,
            ring_capacity: 128,
            sweep_interval: 64,
        }
    }
}

/// Per-session state. Cloning shares the event ring, so a clone taken
/// as a snapshot still answers temporal queries against live history.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub total_calls: u64,
    pub tool_counts: HashMap<String, u64>,
    /// PII types ever observed in this session's tool outputs.
    pub taints: BTreeSet<PiiType>,
    pub pii_tainted: bool,
    pub taint_details: String,
    pub events: Arc<EventRing>,
}

impl SessionState {
    fn new(session_id: &str, ring_capacity: usize) -> Self {
        Self {
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            total_calls: 0,
            tool_counts: HashMap::new(),
            taints: BTreeSet::new(),
            pii_tainted: false,
            taint_details: String::new(),
            events: Arc::new(EventRing::new(ring_capacity)),
        }
    }

    pub fn tool_count(&self, tool: &str) -> u64 {
        self.tool_counts.get(tool).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStoreStats {
    pub active_sessions: usize,
    pub total_created: u64,
    pub total_evicted: u64,
    pub total_expired: u64,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionState>,
    op_count: u64,
    total_created: u64,
    total_evicted: u64,
    total_expired: u64,
}

pub struct SessionStore {
    config: SessionStoreConfig,
    inner: Mutex<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fetch a session, creating it on first sight. Returns a snapshot
    /// clone; the event ring inside it is shared with the live session.
    pub fn get_or_create(&self, session_id: &str) -> SessionState {
        let mut inner = self.inner.lock().unwrap();
        self.tick(&mut inner);
        self.expire_if_stale(&mut inner, session_id);
        self.ensure(&mut inner, session_id).clone()
    }

    /// Fetch a session snapshot without creating one.
    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        let mut inner = self.inner.lock().unwrap();
        self.tick(&mut inner);
        self.expire_if_stale(&mut inner, session_id);
        inner.sessions.get(session_id).cloned()
    }

    /// Record a completed check: bump counters and append a ring event.
    pub fn record_call(&self, session_id: &str, tool: &str, verdict: Verdict, args_summary: &str) {
        let event = ToolEvent::new(tool, verdict, args_summary);
        let ring = {
            let mut inner = self.inner.lock().unwrap();
            self.tick(&mut inner);
            self.expire_if_stale(&mut inner, session_id);
            let session = self.ensure(&mut inner, session_id);
            session.total_calls += 1;
            *session.tool_counts.entry(tool.to_string()).or_insert(0) += 1;
            Arc::clone(&session.events)
        };
        // append outside the store lock; the ring has its own
        ring.append(event);
    }

    /// Merge observed PII types into the session's taint history
    /// without flipping the taint gate.
    pub fn merge_taints(&self, session_id: &str, types: impl IntoIterator<Item = PiiType>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.taints.extend(types);
        }
    }

    /// Merge observed PII types and arm the taint gate for this session.
    pub fn mark_tainted(&self, session_id: &str, types: impl IntoIterator<Item = PiiType>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.taints.extend(types);
            session.pii_tainted = true;
            let seen: Vec<String> = session.taints.iter().map(|t| t.to_string()).collect();
            session.taint_details =
                format!("PII observed in prior tool output: {}", seen.join(", "));
            debug!(session_id, details = %session.taint_details, "session tainted");
        }
    }

    /// Disarm the taint gate. The taint history (types ever seen) is kept.
    pub fn clear_taint(&self, session_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.pii_tainted = false;
            session.taint_details.clear();
        }
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .remove(session_id)
            .is_some()
    }

    pub fn stats(&self) -> SessionStoreStats {
        let inner = self.inner.lock().unwrap();
        SessionStoreStats {
            active_sessions: inner.sessions.len(),
            total_created: inner.total_created,
            total_evicted: inner.total_evicted,
            total_expired: inner.total_expired,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Internals (caller holds the lock) ───────────────────────────

    fn ensure<'a>(&self, inner: &'a mut Inner, session_id: &str) -> &'a mut SessionState {
        if !inner.sessions.contains_key(session_id) {
            if inner.sessions.len() >= self.config.max_sessions {
                self.evict_one(inner);
            }
            debug!(session_id, "creating session");
            inner.total_created += 1;
        }
        let capacity = self.config.ring_capacity;
        inner
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState::new(session_id, capacity))
    }

    fn is_expired(&self, session: &SessionState) -> bool {
        let age = Utc::now().signed_duration_since(session.created_at);
        age.num_seconds() >= 0 && age.num_seconds() as u64 >= self.config.ttl_seconds
    }

    fn expire_if_stale(&self, inner: &mut Inner, session_id: &str) {
        let stale = inner
            .sessions
            .get(session_id)
            .is_some_and(|s| self.is_expired(s));
        if stale {
            inner.sessions.remove(session_id);
            inner.total_expired += 1;
        }
    }

    /// Amortized expiry: a full sweep every `sweep_interval` operations.
    fn tick(&self, inner: &mut Inner) {
        inner.op_count += 1;
        if inner.op_count % self.config.sweep_interval.max(1) != 0 {
            return;
        }
        let before = inner.sessions.len();
        let ttl = self.config.ttl_seconds;
        let now = Utc::now();
        inner.sessions.retain(|_, s| {
            let age = now.signed_duration_since(s.created_at).num_seconds();
            age < 0 || (age as u64) < ttl
        });
        let expired = before - inner.sessions.len();
        if expired > 0 {
            inner.total_expired += expired as u64;
            debug!(expired, "expiry sweep removed sessions");
        }
    }

    /// Least-active-then-oldest eviction: fewest total calls, ties
    /// broken by earliest creation time.
    fn evict_one(&self, inner: &mut Inner) {
        let victim = inner
            .sessions
            .values()
            .min_by_key(|s| (s.total_calls, s.created_at))
            .map(|s| s.session_id.clone());
        if let Some(id) = victim {
            debug!(session_id = %id, "evicting session at capacity");
            inner.sessions.remove(&id);
            inner.total_evicted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store(max_sessions: usize) -> SessionStore {
        SessionStore::new(SessionStoreConfig {
            max_sessions,
            ttl_seconds: 3_600,
            ring_capacity: 8,
            sweep_interval: 4,
        })
    }

    #[test]
    fn creates_lazily_and_counts_calls() {
        let store = small_store(10);
        assert!(store.get("s1").is_none());

        store.record_call("s1", "shell", Verdict::Allow, "ls");
        store.record_call("s1", "shell", Verdict::Block, "rm -rf /");
        store.record_call("s1", "web_fetch", Verdict::Allow, "");

        let s = store.get("s1").unwrap();
        assert_eq!(s.total_calls, 3);
        assert_eq!(s.tool_count("shell"), 2);
        assert_eq!(s.tool_count("web_fetch"), 1);
        assert_eq!(s.events.len(), 3);
    }

    #[test]
    fn counter_outlives_ring_history() {
        let store = small_store(10);
        for _ in 0..20 {
            store.record_call("s1", "shell", Verdict::Allow, "");
        }
        let s = store.get("s1").unwrap();
        assert_eq!(s.total_calls, 20);
        assert_eq!(s.events.len(), 8); // ring capacity
    }

    #[test]
    fn sessions_are_isolated() {
        let store = small_store(10);
        store.record_call("a", "shell", Verdict::Allow, "");
        store.mark_tainted("a", [PiiType::Email]);

        let b = store.get_or_create("b");
        assert_eq!(b.total_calls, 0);
        assert!(!b.pii_tainted);
        assert!(store.get("a").unwrap().pii_tainted);
    }

    #[test]
    fn capacity_evicts_least_active() {
        let store = small_store(2);
        store.record_call("busy", "shell", Verdict::Allow, "");
        store.record_call("busy", "shell", Verdict::Allow, "");
        store.record_call("idle", "shell", Verdict::Allow, "");

        // third session forces eviction of the least active
        store.get_or_create("new");
        assert!(store.get("busy").is_some());
        assert!(store.get("idle").is_none());
        assert_eq!(store.stats().total_evicted, 1);
    }

    #[test]
    fn capacity_tie_breaks_on_oldest() {
        let store = small_store(2);
        store.get_or_create("old");
        std::thread::sleep(std::time::Duration::from_millis(10));
        store.get_or_create("young");
        store.get_or_create("new");

        assert!(store.get("old").is_none());
        assert!(store.get("young").is_some());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn ttl_expires_sessions() {
        let store = SessionStore::new(SessionStoreConfig {
            max_sessions: 10,
            ttl_seconds: 0,
            ring_capacity: 8,
            sweep_interval: 4,
        });
        store.get_or_create("ephemeral");
        assert!(store.get("ephemeral").is_none());
        assert!(store.stats().total_expired >= 1);
    }

    #[test]
    fn store_never_exceeds_capacity() {
        let store = small_store(5);
        for i in 0..50 {
            store.record_call(&format!("s{i}"), "shell", Verdict::Allow, "");
        }
        assert!(store.len() <= 5);
        assert_eq!(store.stats().total_created, 50);
    }

    #[test]
    fn taint_mark_and_clear() {
        let store = small_store(10);
        store.get_or_create("s");
        store.mark_tainted("s", [PiiType::Email, PiiType::Ssn]);

        let s = store.get("s").unwrap();
        assert!(s.pii_tainted);
        assert!(s.taint_details.contains("email"));
        assert!(s.taint_details.contains("ssn"));
        assert_eq!(s.taints.len(), 2);

        store.clear_taint("s");
        let s = store.get("s").unwrap();
        assert!(!s.pii_tainted);
        assert!(s.taint_details.is_empty());
        // history of observed types is retained
        assert_eq!(s.taints.len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let store = small_store(10);
        store.get_or_create("s");
        assert!(store.remove("s"));
        assert!(!store.remove("s"));
        assert!(store.get("s").is_none());
    }
}

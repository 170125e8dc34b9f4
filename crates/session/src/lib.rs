//! Per-session state tracking for the shield engine.
//!
//! Each session carries unbounded call counters, a taint flag fed by
//! PII observed in tool outputs, and a capacity-bounded ring of recent
//! events for temporal correlation. The store bounds total memory with
//! a TTL and a hard session cap (least-active-then-oldest eviction).

mod ring;
mod store;

pub use ring::EventRing;
pub use store::{SessionState, SessionStore, SessionStoreConfig, SessionStoreStats};

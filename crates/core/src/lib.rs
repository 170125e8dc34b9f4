//! # Toolshield Core
//!
//! Domain types, traits, and error definitions for the Toolshield policy
//! engine. This crate has **zero framework dependencies** — it defines the
//! vocabulary (verdicts, PII categories, events, collaborator seams) that
//! all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Collaborator interfaces (approval backends, rule fetchers, trace sinks)
//! are defined as traits here. Implementations live in the host. This keeps
//! the dependency graph pointing inward and lets tests substitute stubs.

pub mod collaborators;
pub mod error;
pub mod event;
pub mod pii;
pub mod verdict;

pub use collaborators::{ApprovalBackend, RuleSourceFetcher};
pub use error::{Error, Result};
pub use event::{ToolEvent, TraceRecord, TraceSink, TracingSink, ARGS_SUMMARY_MAX};
pub use pii::{PiiMatch, PiiType};
pub use verdict::{ApprovalRequest, Severity, ShieldResult, Verdict};

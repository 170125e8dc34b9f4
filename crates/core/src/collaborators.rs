//! Collaborator seams — traits the host implements and the engine
//! consumes. Implementations live outside the core (transport layers,
//! chat integrations, remote config services).

use crate::verdict::ApprovalRequest;

/// Accepts approval requests produced by `Approve` verdicts. The engine
/// submits and moves on; resolution is delivered out-of-band by the host.
pub trait ApprovalBackend: Send + Sync {
    fn submit(&self, request: &ApprovalRequest);
}

/// Supplies raw rule-source bytes plus an optional signature for the
/// engine's reload path to validate before activating.
pub trait RuleSourceFetcher: Send + Sync {
    /// Returns `(bytes, signature)` where the signature, when present,
    /// is a base64-encoded HMAC-SHA256 over the bytes.
    fn fetch(&self) -> std::io::Result<(Vec<u8>, Option<String>)>;
}

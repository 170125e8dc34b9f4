//! Rule-source signature verification.
//!
//! Remote rule fetchers may deliver a detached HMAC-SHA256 signature
//! alongside the rule bytes. Verification is constant-time; a failed
//! check means the engine keeps the previously loaded rule set.

use crate::{RuleError, RuleResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a base64-encoded HMAC-SHA256 signature over `payload`.
///
/// Uses constant-time comparison via `verify_slice`.
pub fn verify_signature(payload: &[u8], signature: &str, key: &[u8]) -> RuleResult<()> {
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| RuleError::SignatureInvalid("signature is not valid base64".into()))?;

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| RuleError::SignatureInvalid("invalid signing key".into()))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| RuleError::SignatureInvalid("signature mismatch".into()))
}

/// Compute the base64 HMAC-SHA256 signature for `payload`. Used by
/// tests and by tooling that publishes signed rule files.
pub fn sign(payload: &[u8], key: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(payload);
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"shield-signing-key";

    #[test]
    fn round_trip_verifies() {
        let payload = b"[[rules]]\nid = \"r1\"\nthen = \"block\"";
        let sig = sign(payload, KEY);
        assert!(verify_signature(payload, &sig, KEY).is_ok());
    }

    #[test]
    fn tampered_payload_rejected() {
        let sig = sign(b"original", KEY);
        let err = verify_signature(b"tampered", &sig, KEY).unwrap_err();
        assert!(matches!(err, RuleError::SignatureInvalid(_)));
    }

    #[test]
    fn wrong_key_rejected() {
        let sig = sign(b"payload", KEY);
        assert!(verify_signature(b"payload", &sig, b"other-key").is_err());
    }

    #[test]
    fn garbage_signature_rejected() {
        assert!(verify_signature(b"payload", "not base64!!", KEY).is_err());
    }

    #[test]
    fn trailing_whitespace_tolerated() {
        let sig = sign(b"payload", KEY);
        assert!(verify_signature(b"payload", &format!("{sig}\n"), KEY).is_ok());
    }
}

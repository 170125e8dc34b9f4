//! PII detection, masking, and structural redaction.
//!
//! The detector pairs regexes with secondary validators (Luhn, weighted
//! mod-11 checksums, date-arrangement checks) so that random digit
//! strings and version numbers are not reported. Redaction walks nested
//! argument structures, masks each matched span, and writes the masked
//! text back through the field path where it was found.
//!
//! ```
//! use toolshield_pii::PiiDetector;
//! use serde_json::json;
//!
//! let detector = PiiDetector::new();
//! let args = json!({"body": "reach me at alice@example.com"});
//! let (redacted, matches) = detector.redact(&args);
//! assert_eq!(matches.len(), 1);
//! assert!(!redacted["body"].as_str().unwrap().contains('@'));
//! ```

mod detector;
mod validators;

pub use detector::{DEFAULT_EDGE_CHARS, PiiDetector, mask};
pub use toolshield_core::{PiiMatch, PiiType};

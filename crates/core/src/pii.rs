//! PII vocabulary — the types of sensitive data the detector reports.

use serde::{Deserialize, Serialize};

/// Categories of personally identifiable information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Email,
    Phone,
    CreditCard,
    Ssn,
    Iban,
    IpAddress,
    Passport,
    DateOfBirth,
    /// Locale-specific national identity number (10- or 12-digit
    /// checksum forms).
    NationalId,
    /// User-registered pattern.
    Custom(String),
}

impl std::fmt::Display for PiiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiiType::Email => f.write_str("email"),
            PiiType::Phone => f.write_str("phone"),
            PiiType::CreditCard => f.write_str("credit_card"),
            PiiType::Ssn => f.write_str("ssn"),
            PiiType::Iban => f.write_str("iban"),
            PiiType::IpAddress => f.write_str("ip_address"),
            PiiType::Passport => f.write_str("passport"),
            PiiType::DateOfBirth => f.write_str("date_of_birth"),
            PiiType::NationalId => f.write_str("national_id"),
            PiiType::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A single detection within a scanned structure. Ephemeral — produced
/// per scan, never stored beyond the result it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PiiMatch {
    /// What kind of data was found.
    pub pii_type: PiiType,
    /// Dot/bracket path to the field the match was found in
    /// (e.g. `config.recipients[2]`). Empty for bare-string scans.
    pub field: String,
    /// Byte offset of the match start within the field's string value.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
    /// The matched text with its interior masked.
    pub masked_value: String,
}

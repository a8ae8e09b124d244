//! QR payload normalization, hashing, and best-effort parsing.
//!
//! A payload is interpreted exactly once, when it enters the coordinator.
//! Parsing tries the known layouts in a fixed order and stops at the first
//! match:
//!
//! 1. JSON object or array
//! 2. Key-value pairs (`Key:Value^Key:Value`, or one `key: value` per line)
//! 3. Positional caret layout (`type^order^customer^package^quantity^article`)
//! 4. Plain text
//!
//! # Examples
//!
//! ```
//! use scandesk_core::payload::{ParsedPayload, ScanPayload};
//!
//! let payload = ScanPayload::new("PAK^NL-2581949^123456^4063025047302^1\r\n");
//! assert_eq!(payload.raw(), "PAK^NL-2581949^123456^4063025047302^1");
//!
//! match payload.parsed() {
//!     ParsedPayload::KeyValue(fields) => assert_eq!(fields["order"], "NL-2581949"),
//!     other => panic!("unexpected format: {}", other.format_name()),
//! }
//! ```

use crate::constants::PAYLOAD_CARET_DELIMITER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Field names of the positional caret layout, in order.
const CARET_FIELDS: [&str; 6] = ["type", "order", "customer", "package", "quantity", "article"];

/// Structured view of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "data", rename_all = "snake_case")]
pub enum ParsedPayload {
    Json(serde_json::Value),
    KeyValue(BTreeMap<String, String>),
    PlainText,
}

impl ParsedPayload {
    /// Parse a normalized payload.
    pub fn parse(payload: &str) -> Self {
        if let Some(value) = parse_json(payload) {
            return ParsedPayload::Json(value);
        }
        if let Some(fields) = parse_key_value(payload) {
            return ParsedPayload::KeyValue(fields);
        }
        if let Some(fields) = parse_positional_caret(payload) {
            return ParsedPayload::KeyValue(fields);
        }
        ParsedPayload::PlainText
    }

    /// Short format label, as persisted alongside the scan.
    #[must_use]
    pub fn format_name(&self) -> &'static str {
        match self {
            ParsedPayload::Json(_) => "json",
            ParsedPayload::KeyValue(_) => "key_value",
            ParsedPayload::PlainText => "plain_text",
        }
    }

    /// Parsed fields as JSON, or `None` for plain text.
    #[must_use]
    pub fn fields_json(&self) -> Option<serde_json::Value> {
        match self {
            ParsedPayload::Json(value) => Some(value.clone()),
            ParsedPayload::KeyValue(fields) => serde_json::to_value(fields).ok(),
            ParsedPayload::PlainText => None,
        }
    }
}

fn parse_json(payload: &str) -> Option<serde_json::Value> {
    if !(payload.starts_with('{') || payload.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        _ => None,
    }
}

fn is_field_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' ' | '.'))
}

fn parse_key_value(payload: &str) -> Option<BTreeMap<String, String>> {
    if !payload.contains(':') || payload.contains("://") {
        return None;
    }

    let parts: Vec<&str> = if payload.contains(PAYLOAD_CARET_DELIMITER) {
        payload.split(PAYLOAD_CARET_DELIMITER).collect()
    } else {
        payload.lines().collect()
    };

    let mut fields = BTreeMap::new();
    for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once(':')?;
        let key = key.trim();
        if !is_field_key(key) {
            return None;
        }
        fields.insert(key.to_lowercase(), value.trim().to_string());
    }

    (!fields.is_empty()).then_some(fields)
}

fn parse_positional_caret(payload: &str) -> Option<BTreeMap<String, String>> {
    let parts: Vec<&str> = payload.split(PAYLOAD_CARET_DELIMITER).collect();
    if parts.len() < 4 {
        return None;
    }

    // order or package must be present for the layout to make sense
    if parts[1].trim().is_empty() && parts[3].trim().is_empty() {
        return None;
    }

    let fields = CARET_FIELDS
        .iter()
        .zip(parts.iter())
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| ((*name).to_string(), value.trim().to_string()))
        .collect();

    Some(fields)
}

/// Strip surrounding whitespace and line terminators added by scanners.
#[must_use]
pub fn normalize(raw: &str) -> &str {
    raw.trim()
}

/// SHA-256 of a normalized payload, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayloadHash(String);

impl PayloadHash {
    /// Hash an already normalized payload.
    #[must_use]
    pub fn of(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        PayloadHash(hex::encode(digest))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payload as seen by the coordinator: normalized, hashed, and parsed once.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPayload {
    raw: String,
    hash: PayloadHash,
    parsed: ParsedPayload,
}

impl ScanPayload {
    pub fn new(raw: &str) -> Self {
        let normalized = normalize(raw);
        Self {
            raw: normalized.to_string(),
            hash: PayloadHash::of(normalized),
            parsed: ParsedPayload::parse(normalized),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn hash(&self) -> &PayloadHash {
        &self.hash
    }

    #[must_use]
    pub fn parsed(&self) -> &ParsedPayload {
        &self.parsed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Consume into `(raw, parsed)`, for building a scan record.
    #[must_use]
    pub fn into_parts(self) -> (String, ParsedPayload) {
        (self.raw, self.parsed)
    }
}

use crate::{
    Result,
    constants::{MAX_TAG_LENGTH, MIN_TAG_LENGTH},
    error::Error,
    payload::ParsedPayload,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque session identifier, assigned when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session ID.
    #[must_use]
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    /// Wrap an existing UUID (used when reading persisted sessions).
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        SessionId(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|e| Error::Config(format!("Invalid session ID {s}: {e}")))
    }
}

/// User identifier as stored in the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        UserId(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable index of a configured scan source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(u16);

impl SourceId {
    #[must_use]
    pub const fn new(index: u16) -> Self {
        SourceId(index)
    }

    #[must_use]
    pub const fn index(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// RFID tag identifier (8-20 hex characters, uppercase).
///
/// Keyboard-wedge readers deliver the tag as typed text, often with stray
/// whitespace and mixed case; parsing normalizes both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(String);

impl TagId {
    /// Parse and normalize a raw tag string.
    ///
    /// # Errors
    /// Returns `Error::InvalidTag` if the trimmed value is not 8-20 hex characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use scandesk_core::TagId;
    ///
    /// let tag = TagId::parse("  04ab12cd9f\n").unwrap();
    /// assert_eq!(tag.as_str(), "04AB12CD9F");
    /// assert!(TagId::parse("xyz").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let tag = raw.trim().to_uppercase();

        let len = tag.len();
        if !(MIN_TAG_LENGTH..=MAX_TAG_LENGTH).contains(&len) {
            return Err(Error::InvalidTag(format!(
                "Tag must be {MIN_TAG_LENGTH}-{MAX_TAG_LENGTH} chars, got {len}"
            )));
        }

        if !tag.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidTag(format!("Tag is not hexadecimal: {tag}")));
        }

        Ok(TagId(tag))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagId::parse(s)
    }
}

/// A user resolved from an RFID tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
}

impl UserProfile {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// One logged-in user's active period.
///
/// Sessions are created by an RFID login and ended by the matching logout.
/// An ended session is frozen: no further scans attach to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub scan_count: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    /// Last time an RFID toggle touched this session.
    pub last_rfid_at: DateTime<Utc>,
}

impl Session {
    /// Open a new session for `user_id` at `now`.
    #[must_use]
    pub fn start(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            started_at: now,
            ended_at: None,
            scan_count: 0,
            last_scan_at: None,
            last_rfid_at: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Session length, up to `now` while still active.
    #[must_use]
    pub fn duration(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

/// One accepted QR payload attached to a session. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub session_id: SessionId,
    pub raw_payload: String,
    pub parsed: ParsedPayload,
    pub captured_at: DateTime<Utc>,
    pub source_id: SourceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("04AB12CD", "04AB12CD")]
    #[case(" 04ab12cd9f ", "04AB12CD9F")]
    #[case("0123456789abcdef0123", "0123456789ABCDEF0123")]
    fn test_tag_id_valid(#[case] input: &str, #[case] expected: &str) {
        let tag = TagId::parse(input).unwrap();
        assert_eq!(tag.as_str(), expected);
    }

    #[rstest]
    #[case("")] // empty
    #[case("1234567")] // too short
    #[case("0123456789ABCDEF01234")] // too long
    #[case("04AB12CZ")] // not hex
    fn test_tag_id_invalid(#[case] input: &str) {
        assert!(matches!(TagId::parse(input), Err(Error::InvalidTag(_))));
    }

    #[test]
    fn test_session_start_is_active() {
        let now = Utc::now();
        let session = Session::start(UserId::new(1), now);

        assert!(session.is_active());
        assert_eq!(session.scan_count, 0);
        assert_eq!(session.last_rfid_at, now);
        assert!(session.last_scan_at.is_none());
    }

    #[test]
    fn test_session_duration() {
        let start = Utc::now();
        let mut session = Session::start(UserId::new(1), start);
        let later = start + chrono::Duration::seconds(90);

        assert_eq!(session.duration(later).num_seconds(), 90);

        session.ended_at = Some(start + chrono::Duration::seconds(30));
        assert_eq!(session.duration(later).num_seconds(), 30);
    }

    #[test]
    fn test_session_id_roundtrip_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId::new(3).to_string(), "source-3");
    }
}

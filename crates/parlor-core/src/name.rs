//! Display names.
//!
//! Names are checked once, before a connection is upgraded. Duplicates are
//! allowed: two connections may go by the same name.

use chrono::{DateTime, Utc};

use crate::error::NameError;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// A validated display name bound to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate a client-supplied name.
    ///
    /// Only letters (A-Z, a-z), digits, underscores and dashes are allowed.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        let len = raw.chars().count();
        if len > MAX_NAME_CHARS {
            return Err(NameError::TooLong { len });
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(NameError::InvalidCharacters);
        }
        Ok(Self(raw.to_string()))
    }

    /// Resolve the name for a connection accepted at `at`.
    ///
    /// An absent or empty request gets a synthetic name; anything else must
    /// pass [`DisplayName::parse`].
    pub fn resolve(requested: Option<&str>, at: DateTime<Utc>) -> Result<Self, NameError> {
        match requested {
            None | Some("") => Ok(Self::synthetic(at)),
            Some(raw) => Self::parse(raw),
        }
    }

    /// `User-<n>` where `n` is the acceptance instant's unix nanoseconds mod 10000.
    pub fn synthetic(at: DateTime<Utc>) -> Self {
        let nanos = at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| i64::from(at.timestamp_subsec_nanos()));
        Self(format!("User-{}", nanos.rem_euclid(10_000)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_allowed_characters() {
        for name in ["alice", "Bob_99", "a-b-c", "_", "-", "Z"] {
            let parsed = DisplayName::parse(name).unwrap();
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn accepts_exactly_max_length() {
        let name = "x".repeat(MAX_NAME_CHARS);
        assert!(DisplayName::parse(&name).is_ok());
    }

    #[test]
    fn rejects_over_max_length() {
        let name = "x".repeat(MAX_NAME_CHARS + 1);
        assert_eq!(
            DisplayName::parse(&name),
            Err(NameError::TooLong { len: MAX_NAME_CHARS + 1 })
        );
    }

    #[test]
    fn rejects_disallowed_characters() {
        for name in ["alice bob", "a.b", "name!", "ünïcode", "tab\t", "<script>"] {
            assert_eq!(
                DisplayName::parse(name),
                Err(NameError::InvalidCharacters),
                "{name:?} should be refused"
            );
        }
    }

    #[test]
    fn length_is_checked_before_charset() {
        let name = "!".repeat(MAX_NAME_CHARS + 5);
        assert!(matches!(
            DisplayName::parse(&name),
            Err(NameError::TooLong { .. })
        ));
    }

    #[test]
    fn empty_request_gets_synthetic_name() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let from_none = DisplayName::resolve(None, at).unwrap();
        let from_empty = DisplayName::resolve(Some(""), at).unwrap();
        // 1_700_000_000_123_456_789 mod 10000
        assert_eq!(from_none.as_str(), "User-6789");
        assert_eq!(from_none, from_empty);
    }

    #[test]
    fn synthetic_name_is_itself_valid() {
        let name = DisplayName::synthetic(Utc::now());
        assert!(DisplayName::parse(name.as_str()).is_ok());
    }

    #[test]
    fn resolve_validates_supplied_name() {
        let at = Utc::now();
        assert_eq!(DisplayName::resolve(Some("alice"), at).unwrap().as_str(), "alice");
        assert!(DisplayName::resolve(Some("bad name"), at).is_err());
    }
}

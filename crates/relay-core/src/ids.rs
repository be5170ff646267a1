use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Wire length of a session id: canonical hyphenated form, always.
pub const SESSION_ID_LEN: usize = 36;

/// Identifier for one receive session: a random v4 UUID in its canonical
/// 36-character hyphenated form. Clients echo this exact string back in
/// submissions, so no prefix or alternate encoding is ever produced or
/// accepted.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("session id must be a 36-character hyphenated uuid")]
pub struct ParseSessionIdError;

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Strict parse of the wire form. `Uuid::parse_str` on its own also
    /// accepts 32-character compact and urn encodings, so the exact length
    /// is checked first.
    pub fn parse(s: &str) -> Result<Self, ParseSessionIdError> {
        if s.len() != SESSION_ID_LEN {
            return Err(ParseSessionIdError);
        }
        Uuid::parse_str(s).map(Self).map_err(|_| ParseSessionIdError)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_has_wire_length() {
        let id = SessionId::new();
        assert_eq!(id.to_string().len(), SESSION_ID_LEN, "got: {id}");
    }

    #[test]
    fn new_id_has_v4_version_and_variant_bits() {
        let s = SessionId::new().to_string();
        let bytes = s.as_bytes();
        assert_eq!(bytes[14], b'4', "version nibble, got: {s}");
        assert!(
            matches!(bytes[19], b'8' | b'9' | b'a' | b'b'),
            "variant nibble, got: {s}"
        );
    }

    #[test]
    fn ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let id = SessionId::new();
        let parsed = SessionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_str_matches_parse() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("abc").is_err());
        // 35 characters
        assert!(SessionId::parse("123e4567-e89b-12d3-a456-42661417400").is_err());
        // 37 characters
        assert!(SessionId::parse("123e4567-e89b-12d3-a456-4266141740000").is_err());
    }

    #[test]
    fn parse_rejects_compact_form() {
        // Uuid::parse_str would accept this; the wire contract does not.
        assert!(SessionId::parse("123e4567e89b12d3a456426614174000").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(SessionId::parse("123e4567-e89b-12d3-a456-42661417400z").is_err());
    }

    #[test]
    fn serde_is_the_bare_string() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}

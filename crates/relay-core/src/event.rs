/// Payload of the `eof` event when the upstream closes normally.
pub const EOF_MARKER: &str = "EOF";

/// One event on a session's delivery channel.
///
/// `Uuid` announces a fresh session to its client. `Message` carries one
/// content fragment. `Eof` and `Error` end one streaming attempt but not the
/// session: the connection stays open for further submissions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Uuid(String),
    Message(String),
    Eof(String),
    Error(String),
}

impl SessionEvent {
    pub fn message(fragment: impl Into<String>) -> Self {
        Self::Message(fragment.into())
    }

    pub fn eof() -> Self {
        Self::Eof(EOF_MARKER.to_string())
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error(reason.into())
    }

    /// Wire event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::Message(_) => "message",
            Self::Eof(_) => "eof",
            Self::Error(_) => "error",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::Uuid(s) | Self::Message(s) | Self::Eof(s) | Self::Error(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_wire_names() {
        assert_eq!(SessionEvent::Uuid("x".into()).kind(), "uuid");
        assert_eq!(SessionEvent::message("x").kind(), "message");
        assert_eq!(SessionEvent::eof().kind(), "eof");
        assert_eq!(SessionEvent::error("x").kind(), "error");
    }

    #[test]
    fn payload_is_the_carried_text() {
        assert_eq!(SessionEvent::message("Hel").payload(), "Hel");
        assert_eq!(SessionEvent::error("boom").payload(), "boom");
        assert_eq!(SessionEvent::eof().payload(), EOF_MARKER);
    }
}

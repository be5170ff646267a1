//! Parsing for chat-completion SSE payloads.

use serde::Deserialize;

use relay_core::ProviderError;

/// Sentinel `data:` payload marking the end of a completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// What a single decoded `data:` payload contributes to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A content fragment to forward. May be empty.
    Fragment(String),
    /// A frame carrying no content (role announcement, usage frame).
    Skip,
    /// The `[DONE]` sentinel.
    Done,
}

/// Parse raw SSE text into (event_type, data) pairs.
///
/// The chat-completions protocol sends bare `data:` lines with no `event:`
/// field, so a pair is emitted whenever either field was seen before the
/// blank-line separator.
pub fn parse_sse_lines(raw: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut current_event = String::new();
    let mut current_data = String::new();

    for line in raw.lines() {
        if let Some(event) = line.strip_prefix("event: ") {
            current_event = event.to_string();
        } else if let Some(data) = line.strip_prefix("data: ") {
            current_data = data.to_string();
        } else if line.is_empty() && (!current_event.is_empty() || !current_data.is_empty()) {
            events.push((current_event.clone(), current_data.clone()));
            current_event.clear();
            current_data.clear();
        }
    }

    // Flush a trailing event that arrived without a closing blank line.
    if !current_event.is_empty() || !current_data.is_empty() {
        events.push((current_event, current_data));
    }

    events
}

/// Decode one `data:` payload from a chat-completion stream.
///
/// A chunk whose delta carries `content` (even `""`) is a fragment; a chunk
/// without it has nothing to forward. Malformed JSON is a protocol failure.
pub fn parse_chunk(data: &str) -> Result<Chunk, ProviderError> {
    if data == DONE_MARKER {
        return Ok(Chunk::Done);
    }

    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|e| ProviderError::StreamInterrupted(format!("malformed stream chunk: {e}")))?;

    match payload.choices.into_iter().next() {
        Some(choice) => match choice.delta.content {
            Some(content) => Ok(Chunk::Fragment(content)),
            None => Ok(Chunk::Skip),
        },
        None => Ok(Chunk::Skip),
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

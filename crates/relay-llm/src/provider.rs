use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use relay_core::provider::{CompletionOptions, CompletionProvider, CompletionStream};
use relay_core::{ChatMessage, ProviderError};

use crate::sse::{self, Chunk};

/// Default endpoint root for hosted chat completions.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at a non-default endpoint root.
    pub fn with_base_url(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

fn build_request_body(
    conversation: &[ChatMessage],
    options: &CompletionOptions,
) -> serde_json::Value {
    serde_json::json!({
        "model": options.model,
        "max_tokens": options.max_tokens,
        "stream": true,
        "messages": conversation,
    })
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, conversation, options), fields(model = %options.model))]
    async fn stream(
        &self,
        conversation: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionStream, ProviderError> {
        let body = build_request_body(conversation, options);
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header(
                "authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("accept", "text/event-stream")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        Ok(Box::pin(SseStream::new(resp.bytes_stream())))
    }
}

/// Wraps the response byte stream and yields content fragments.
///
/// Buffers raw bytes until a blank line completes each SSE event and only
/// then decodes it, so a character split across network chunks is
/// reassembled before decoding. The stream ends at the `[DONE]` marker or
/// when the upstream connection closes; there is no read deadline, so a
/// quiet upstream keeps the stream open.
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: bytes::BytesMut,
    pending: Vec<Result<String, ProviderError>>,
    done: bool,
}

fn find_event_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\n\n")
}

impl SseStream {
    fn new(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: bytes::BytesMut::new(),
            pending: Vec::new(),
            done: false,
        }
    }

    fn decode_chunk(&mut self, raw: &str) {
        for (_, data) in sse::parse_sse_lines(raw) {
            if self.done {
                break;
            }
            match sse::parse_chunk(&data) {
                Ok(Chunk::Fragment(text)) => self.pending.push(Ok(text)),
                Ok(Chunk::Skip) => {}
                Ok(Chunk::Done) => self.done = true,
                Err(e) => {
                    self.pending.push(Err(e));
                    self.done = true;
                }
            }
        }
    }
}

impl Stream for SseStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        loop {
            // Deliver decoded fragments before polling for more bytes
            if !self.pending.is_empty() {
                return std::task::Poll::Ready(Some(self.pending.remove(0)));
            }
            if self.done {
                return std::task::Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);

                    // Decode complete SSE events only; bytes after the last
                    // blank line may end mid-character.
                    while let Some(pos) = find_event_boundary(&self.buffer) {
                        let event = self.buffer.split_to(pos + 2);
                        let text = String::from_utf8_lossy(&event);
                        self.decode_chunk(&text);
                    }
                }
                std::task::Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return std::task::Poll::Ready(Some(Err(ProviderError::StreamInterrupted(
                        e.to_string(),
                    ))));
                }
                std::task::Poll::Ready(None) => {
                    // Upstream closed without [DONE]; process remaining buffer
                    if !self.buffer.is_empty() {
                        let remaining = std::mem::take(&mut self.buffer);
                        let text = String::from_utf8_lossy(&remaining);
                        self.decode_chunk(&text);
                    }
                    self.done = true;
                }
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}

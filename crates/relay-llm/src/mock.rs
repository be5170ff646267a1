use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use relay_core::provider::{CompletionOptions, CompletionProvider, CompletionStream};
use relay_core::{ChatMessage, ProviderError};

/// Pre-programmed responses for deterministic testing without API calls.
pub enum MockResponse {
    /// Yield these fragments, then end the stream normally.
    Fragments(Vec<String>),
    /// Yield these fragments, then fail mid-stream.
    FailAfter(Vec<String>, ProviderError),
    /// Return an error from the stream() call itself.
    Refuse(ProviderError),
    /// Never yield anything; the stream stays open until dropped.
    Hang,
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: fragments followed by a normal end of stream.
    pub fn fragments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(parts.into_iter().map(Into::into).collect())
    }

    /// Convenience: fragments followed by a mid-stream failure.
    pub fn fail_after<I, S>(parts: I, error: ProviderError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FailAfter(parts.into_iter().map(Into::into).collect(), error)
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(
        &self,
        _conversation: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<CompletionStream, ProviderError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        let Some(response) = self.responses.get(idx) else {
            return Err(ProviderError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: &MockResponse) -> Result<CompletionStream, ProviderError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Fragments(parts) => {
                let items: Vec<Result<String, ProviderError>> =
                    parts.iter().cloned().map(Ok).collect();
                return Ok(Box::pin(stream::iter(items)));
            }
            MockResponse::FailAfter(parts, error) => {
                let mut items: Vec<Result<String, ProviderError>> =
                    parts.iter().cloned().map(Ok).collect();
                items.push(Err(error.clone()));
                return Ok(Box::pin(stream::iter(items)));
            }
            MockResponse::Refuse(error) => return Err(error.clone()),
            MockResponse::Hang => {
                return Ok(Box::pin(
                    stream::pending::<Result<String, ProviderError>>(),
                ));
            }
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(*duration).await;
                current = inner;
            }
        }
    }
}

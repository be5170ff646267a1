//! Streaming bridge: turns an accepted submission into a background task
//! that forwards upstream fragments into the session's delivery channel.
//!
//! The bridge owns the per-session concurrency rule. A submission first
//! claims the session's streaming slot, then opens the upstream stream, and
//! only once the upstream has accepted does the forward task detach. The
//! claim travels with the task and releases when it finishes or when the
//! session is retired out from under it.

use std::sync::Arc;

use futures::StreamExt;

use relay_core::provider::{CompletionOptions, CompletionProvider, CompletionStream};
use relay_core::{ChatMessage, ProviderError, SessionEvent, SessionId};

use crate::registry::{RegistryError, SessionRegistry, StreamClaim};

/// Why a submission was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The target session is not open.
    #[error("no open session with that id")]
    SessionNotFound,

    /// The target session is still streaming a previous response.
    #[error("session is already streaming a response")]
    StreamBusy,

    /// The upstream refused to start a response stream.
    #[error(transparent)]
    Upstream(#[from] ProviderError),
}

impl SubmitError {
    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::SessionNotFound => "session_not_found",
            SubmitError::StreamBusy => "stream_busy",
            SubmitError::Upstream(e) => e.error_kind(),
        }
    }
}

/// Bridges accepted submissions onto session delivery channels.
pub struct StreamBridge {
    registry: Arc<SessionRegistry>,
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl StreamBridge {
    pub fn new(
        registry: Arc<SessionRegistry>,
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            registry,
            provider,
            options,
        }
    }

    /// Submit a conversation on behalf of a session.
    ///
    /// Returns once the upstream has accepted the request and the forward
    /// task is running. The session's answer arrives asynchronously on its
    /// delivery channel: zero or more `message` events, then exactly one
    /// `eof` or `error`.
    pub async fn submit(
        &self,
        session_id: SessionId,
        conversation: Vec<ChatMessage>,
    ) -> Result<(), SubmitError> {
        let claim = self
            .registry
            .claim_stream(&session_id)
            .map_err(|e| match e {
                RegistryError::Busy => SubmitError::StreamBusy,
                _ => SubmitError::SessionNotFound,
            })?;

        let stream = match self.provider.stream(&conversation, &self.options).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    kind = e.error_kind(),
                    error = %e,
                    "upstream refused the request"
                );
                // Claim drops here, freeing the slot for a retry.
                return Err(SubmitError::Upstream(e));
            }
        };

        tracing::info!(session_id = %session_id, provider = self.provider.name(), "stream opened");

        let registry = Arc::clone(&self.registry);
        tokio::spawn(forward(registry, session_id, stream, claim));
        Ok(())
    }
}

/// Drain one upstream stream into the session's delivery channel.
///
/// Ends on the first of: upstream close (publishes `eof`), upstream error
/// (publishes `error`), subscriber gone (publish fails or the claim token
/// fires). The claim is held for the whole duration and released on return.
async fn forward(
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
    mut stream: CompletionStream,
    claim: StreamClaim,
) {
    let mut fragments = 0usize;

    loop {
        let item = tokio::select! {
            _ = claim.cancelled() => {
                tracing::debug!(session_id = %session_id, "session retired mid-stream, dropping upstream");
                return;
            }
            item = stream.next() => item,
        };

        match item {
            Some(Ok(text)) => {
                fragments += 1;
                if registry
                    .publish(&session_id, SessionEvent::message(text))
                    .await
                    .is_err()
                {
                    tracing::debug!(session_id = %session_id, "subscriber gone, dropping upstream");
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(
                    session_id = %session_id,
                    kind = e.error_kind(),
                    error = %e,
                    "upstream stream failed"
                );
                let _ = registry
                    .publish(&session_id, SessionEvent::error(e.to_string()))
                    .await;
                return;
            }
            None => {
                tracing::info!(session_id = %session_id, fragments, "stream complete");
                let _ = registry.publish(&session_id, SessionEvent::eof()).await;
                return;
            }
        }
    }
}

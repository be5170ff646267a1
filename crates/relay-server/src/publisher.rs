//! SSE publisher: the subscriber-facing half of a session.
//!
//! [`open`] registers a session and returns a stream of `(event, payload)`
//! frames: the `uuid` announcement first, then every event delivered on the
//! session's channel, rendered under the configured policy. Dropping the
//! stream retires the session, so a client disconnect tears down everything
//! parked behind it.
//!
//! The announcement and the collision notice are emitted raw. Rendering
//! applies only to channel-delivered events.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use relay_core::{SessionEvent, SessionId};

use crate::registry::SessionRegistry;
use crate::render::RenderPolicy;

/// Sent on the `error` event when the freshly generated session id is
/// already live. The subscriber's only move is to reconnect.
pub const COLLISION_MESSAGE: &str =
    "The UUID already exists; please refresh the page and attempt again.";

/// Open a new session and return its event stream.
///
/// On a registration collision the stream carries a single raw `error` frame
/// and then closes; no session is held.
pub fn open(registry: Arc<SessionRegistry>, policy: RenderPolicy) -> ReceiveStream {
    match registry.register() {
        Ok((session_id, rx)) => {
            tracing::info!(session_id = %session_id, "session opened");
            ReceiveStream {
                registry,
                policy,
                session: Some(session_id),
                rx: Some(rx),
                intro: VecDeque::from([("uuid", session_id.to_string())]),
            }
        }
        Err(e) => {
            tracing::warn!(kind = e.kind(), "session registration failed");
            ReceiveStream::collision(registry, policy)
        }
    }
}

/// Stream of `(event, payload)` frames for one subscriber.
pub struct ReceiveStream {
    registry: Arc<SessionRegistry>,
    policy: RenderPolicy,
    session: Option<SessionId>,
    rx: Option<mpsc::Receiver<SessionEvent>>,
    intro: VecDeque<(&'static str, String)>,
}

impl ReceiveStream {
    fn collision(registry: Arc<SessionRegistry>, policy: RenderPolicy) -> Self {
        Self {
            registry,
            policy,
            session: None,
            rx: None,
            intro: VecDeque::from([("error", COLLISION_MESSAGE.to_string())]),
        }
    }

    /// Wrap the stream as an SSE response body with periodic keep-alives.
    pub fn into_sse(self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        Sse::new(self.map(|(kind, payload)| {
            Ok::<_, Infallible>(Event::default().event(kind).data(payload))
        }))
        .keep_alive(KeepAlive::default())
    }
}

impl Stream for ReceiveStream {
    type Item = (&'static str, String);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(frame) = this.intro.pop_front() {
            return Poll::Ready(Some(frame));
        }

        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };

        match rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                Poll::Ready(Some((event.kind(), this.policy.render(event.payload()))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ReceiveStream {
    fn drop(&mut self) {
        if let Some(session_id) = self.session.take() {
            tracing::info!(session_id = %session_id, "subscriber disconnected");
            self.registry.retire(&session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn open_and_announce(
        registry: &Arc<SessionRegistry>,
        policy: RenderPolicy,
    ) -> (ReceiveStream, SessionId) {
        let mut stream = open(Arc::clone(registry), policy);
        let (kind, payload) = stream.next().await.unwrap();
        assert_eq!(kind, "uuid");
        let id = SessionId::parse(&payload).unwrap();
        (stream, id)
    }

    #[tokio::test]
    async fn announces_the_session_id_first() {
        let registry = Arc::new(SessionRegistry::new());
        let (stream, id) = open_and_announce(&registry, RenderPolicy::EscapedHtml).await;

        assert!(registry.exists(&id));
        assert_eq!(stream.session, Some(id));
    }

    #[tokio::test]
    async fn announcement_bypasses_the_render_policy() {
        // Under the JSON policy a rendered announcement would come wrapped.
        let registry = Arc::new(SessionRegistry::new());
        let mut stream = open(Arc::clone(&registry), RenderPolicy::JsonWrapped);

        let (kind, payload) = stream.next().await.unwrap();
        assert_eq!(kind, "uuid");
        assert!(SessionId::parse(&payload).is_ok(), "got: {payload}");
    }

    #[tokio::test]
    async fn channel_events_are_rendered() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut stream, id) = open_and_announce(&registry, RenderPolicy::EscapedHtml).await;

        registry
            .publish(&id, SessionEvent::message("a b"))
            .await
            .unwrap();
        assert_eq!(
            stream.next().await.unwrap(),
            ("message", "a&nbsp;b".to_string())
        );
    }

    #[tokio::test]
    async fn stays_open_after_eof() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut stream, id) = open_and_announce(&registry, RenderPolicy::EscapedHtml).await;

        registry.publish(&id, SessionEvent::eof()).await.unwrap();
        assert_eq!(stream.next().await.unwrap(), ("eof", "EOF".to_string()));

        // The session survives the terminal event; a follow-up submission
        // can stream on the same connection.
        assert!(registry.exists(&id));
        registry
            .publish(&id, SessionEvent::message("again"))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().1, "again");
    }

    #[tokio::test]
    async fn drop_retires_the_session() {
        let registry = Arc::new(SessionRegistry::new());
        let (stream, id) = open_and_announce(&registry, RenderPolicy::EscapedHtml).await;

        drop(stream);
        assert!(!registry.exists(&id));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn drop_unblocks_a_parked_publisher() {
        let registry = Arc::new(SessionRegistry::new());
        let (stream, id) = open_and_announce(&registry, RenderPolicy::EscapedHtml).await;

        registry
            .publish(&id, SessionEvent::message("fills the slot"))
            .await
            .unwrap();

        let parked = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .publish(&id, SessionEvent::message("parked"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(stream);

        let result = tokio::time::timeout(Duration::from_secs(1), parked)
            .await
            .expect("publish must resolve once the subscriber is gone")
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn collision_stream_reports_and_closes() {
        let registry = Arc::new(SessionRegistry::new());
        let mut stream = ReceiveStream::collision(registry, RenderPolicy::EscapedHtml);

        let (kind, payload) = stream.next().await.unwrap();
        assert_eq!(kind, "error");
        assert_eq!(payload, COLLISION_MESSAGE);
        assert!(stream.next().await.is_none());
    }
}

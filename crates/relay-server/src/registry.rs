//! Session registry: one entry per connected SSE subscriber.
//!
//! Each entry owns the sending half of the session's event channel plus a
//! cancellation token that fires when the subscriber goes away. Producers
//! never touch the channel directly; they go through [`SessionRegistry::publish`]
//! so that a vanished subscriber unblocks them instead of wedging them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use relay_core::{SessionEvent, SessionId};

/// Capacity of each session's event channel. One slot keeps producers in
/// lockstep with the subscriber's consumption rate.
const EVENT_QUEUE_CAPACITY: usize = 1;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The session id is already taken by a live session.
    #[error("session id is already in use")]
    Collision,

    /// No open session with that id.
    #[error("no open session with that id")]
    NotFound,

    /// The session already has an active upstream stream.
    #[error("session is already streaming a response")]
    Busy,
}

impl RegistryError {
    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Collision => "collision",
            RegistryError::NotFound => "not_found",
            RegistryError::Busy => "busy",
        }
    }
}

struct SessionEntry {
    tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
    streaming: Arc<AtomicBool>,
}

/// Registry of open sessions, keyed by session id.
///
/// Cheap to share: handlers hold it behind an [`Arc`] and every operation
/// takes `&self`.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Open a new session under a freshly generated id.
    ///
    /// Returns the id and the receiving half of the session's event channel.
    /// Fails with [`RegistryError::Collision`] if the generated id is somehow
    /// already live; callers surface that to the subscriber rather than
    /// retrying, matching the announce-once contract of the SSE handshake.
    pub fn register(&self) -> Result<(SessionId, mpsc::Receiver<SessionEvent>), RegistryError> {
        let id = SessionId::new();
        let rx = self.insert(id)?;
        Ok((id, rx))
    }

    fn insert(&self, id: SessionId) -> Result<mpsc::Receiver<SessionEvent>, RegistryError> {
        // Reserve through the entry API; a separate lookup-then-insert would
        // let two registrations race on the same id.
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::Collision),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
                slot.insert(SessionEntry {
                    tx,
                    cancel: CancellationToken::new(),
                    streaming: Arc::new(AtomicBool::new(false)),
                });
                Ok(rx)
            }
        }
    }

    /// Whether a session with this id is currently open.
    pub fn exists(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of open sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver one event to a session, waiting for the subscriber to drain
    /// its channel slot if necessary.
    ///
    /// Resolves with [`RegistryError::NotFound`] once the session is retired,
    /// even if the producer was already parked on a full channel.
    pub async fn publish(&self, id: &SessionId, event: SessionEvent) -> Result<(), RegistryError> {
        let (tx, cancel) = {
            let entry = self.sessions.get(id).ok_or(RegistryError::NotFound)?;
            (entry.tx.clone(), entry.cancel.clone())
            // Guard dropped here; never hold a map ref across an await.
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(RegistryError::NotFound),
            sent = tx.send(event) => sent.map_err(|_| RegistryError::NotFound),
        }
    }

    /// Close a session and wake every producer blocked on it.
    pub fn retire(&self, id: &SessionId) {
        if let Some((_, entry)) = self.sessions.remove(id) {
            entry.cancel.cancel();
            tracing::debug!(session_id = %id, "session retired");
        }
    }

    /// Claim the session's single streaming slot.
    ///
    /// At most one claim is live per session; a second claim fails with
    /// [`RegistryError::Busy`] until the first one is dropped. The claim also
    /// carries the session's cancellation token so the holder can stop work
    /// the moment the subscriber disconnects.
    pub fn claim_stream(&self, id: &SessionId) -> Result<StreamClaim, RegistryError> {
        let (streaming, cancel) = {
            let entry = self.sessions.get(id).ok_or(RegistryError::NotFound)?;
            (Arc::clone(&entry.streaming), entry.cancel.clone())
        };

        if streaming
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(RegistryError::Busy);
        }

        Ok(StreamClaim { streaming, cancel })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on a session's streaming slot. Releases on drop.
pub struct StreamClaim {
    streaming: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl StreamClaim {
    /// Resolves when the session is retired.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::Release);
    }
}

//! Best-effort audit copies of accepted submission bodies.
//!
//! One file per session, named `<session-id>.json`, holding the raw request
//! body exactly as received. A later submission on the same session
//! overwrites the earlier file. Writes run on a detached task and failures
//! never surface to the request that triggered them.

use std::path::PathBuf;

use bytes::Bytes;

use relay_core::SessionId;

pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Queue one body for writing and return immediately.
    pub fn record(&self, session_id: SessionId, body: Bytes) {
        let path = self.dir.join(format!("{session_id}.json"));
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::write(&path, &body).await {
                tracing::debug!(path = %path.display(), error = %e, "audit write failed");
            }
        });
    }
}

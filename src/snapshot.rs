use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::error::UpdateError;
use crate::model::PollSnapshot;

/// Outcome of one completed poll cycle, fanned out to every subscriber.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollEvent {
    /// A fresh snapshot was published.
    Updated,
    /// The refresh failed; the previous snapshot (if any) is retained.
    Failed,
}

/// Poll bookkeeping, kept for logging and the one-shot report.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct PollStatus {
    pub refreshes: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_refresh_ok: bool,
}

/// The process-wide holder of the most recent session list.
///
/// There is exactly one writer (the poller); every configured entry reads
/// through an [`Arc`] clone of the current snapshot, so a cycle's
/// derivations never observe a torn list. A failed refresh leaves the
/// snapshot untouched and only flips the status bookkeeping.
#[derive(Debug)]
pub struct SnapshotStore {
    snapshot: RwLock<Option<Arc<PollSnapshot>>>,
    status: RwLock<PollStatus>,
    events: Sender<PollEvent>,
}

impl SnapshotStore {
    const POLL_EVENTS_BUFFER_SIZE: usize = 16;

    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            status: RwLock::new(PollStatus::default()),
            events: Sender::new(Self::POLL_EVENTS_BUFFER_SIZE),
        }
    }

    /// The last successfully fetched snapshot, or `None` before the first
    /// successful poll.
    pub async fn current(&self) -> Option<Arc<PollSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> PollStatus {
        self.status.read().await.clone()
    }

    /// Subscribe to poll outcomes. Entries subscribe at setup and drop the
    /// receiver at teardown; a send without subscribers is fine.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<PollEvent> {
        self.events.subscribe()
    }

    /// Replace the snapshot after a successful fetch and notify subscribers.
    pub async fn publish(&self, snapshot: PollSnapshot) {
        *self.snapshot.write().await = Some(Arc::new(snapshot));

        let mut status = self.status.write().await;
        status.refreshes += 1;
        status.last_success_at = Some(Utc::now().to_rfc3339());
        status.last_error = None;
        status.last_refresh_ok = true;
        drop(status);

        let _ = self.events.send(PollEvent::Updated);
    }

    /// Record a failed fetch and notify subscribers. The retained snapshot
    /// is deliberately left in place.
    pub async fn mark_failed(&self, err: &UpdateError) {
        let mut status = self.status.write().await;
        status.failures += 1;
        status.last_failure_at = Some(Utc::now().to_rfc3339());
        status.last_error = Some(err.to_string());
        status.last_refresh_ok = false;
        drop(status);

        let _ = self.events.send(PollEvent::Failed);
    }

    /// True once a snapshot exists and the most recent cycle succeeded.
    /// Entities report unavailable until this first becomes true.
    pub async fn is_live(&self) -> bool {
        self.status.read().await.last_refresh_ok && self.snapshot.read().await.is_some()
    }
}

mod client;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::error::UpdateError;
use crate::model::{PollSnapshot, Session};
use crate::snapshot::SnapshotStore;

pub use self::client::RwfcClient;

/// Fixed refresh period. The upstream list changes on the order of
/// seconds, and 5s is what its operators expect from pollers.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Where session lists come from. The live implementation is
/// [`RwfcClient`]; tests substitute a scripted source.
#[async_trait]
pub trait SessionSource: Send + Sync + 'static {
    async fn fetch_sessions(&self) -> Result<Vec<Session>, UpdateError>;
}

/// The single poll loop behind the shared snapshot store.
///
/// One cycle at a time: the next tick is only taken after the previous
/// fetch completed, and missed ticks are skipped rather than queued. A
/// failed cycle is logged and recorded, never retried early.
pub struct RwfcPoller {
    source: Arc<dyn SessionSource>,
    store: Arc<SnapshotStore>,
}

impl RwfcPoller {
    #[must_use]
    pub fn new(source: Arc<dyn SessionSource>, store: Arc<SnapshotStore>) -> Self {
        Self { source, store }
    }

    /// Run exactly one fetch-and-publish cycle.
    pub async fn refresh(&self) -> Result<(), UpdateError> {
        let start = Instant::now();
        let result = self.source.fetch_sessions().await;
        let elapsed = start.elapsed().as_millis();

        match result {
            Ok(sessions) => {
                let snapshot = PollSnapshot::from_sessions(sessions);
                log::debug!(
                    "Session refresh ok in {elapsed}ms ({} rooms)",
                    snapshot.session_count()
                );
                self.store.publish(snapshot).await;
                Ok(())
            }
            Err(err) => {
                log::warn!("Session refresh failed after {elapsed}ms: {err}");
                self.store.mark_failed(&err).await;
                Err(err)
            }
        }
    }

    /// Poll until told to shut down. The first refresh happens
    /// immediately; afterwards the fixed interval takes over.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = interval(SCAN_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // a dropped sender means the owner is gone; stop either way
                    if changed.is_err() || *shutdown.borrow() {
                        log::debug!("Session poller stopping");
                        return;
                    }
                }
                _ = tick.tick() => {
                    let _ = self.refresh().await;
                }
            }
        }
    }
}

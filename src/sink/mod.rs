pub mod hass;
pub mod log;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BridgeResult;
use crate::model::PollSnapshot;
use crate::sensor::{Sensor, SensorState};

pub use self::hass::HassSink;
pub use self::log::LogSink;

/// One sensor's computed reading, addressed by its ids.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct SensorReport {
    pub unique_id: String,
    /// Home Assistant object id; the full entity id is `sensor.{object_id}`.
    pub object_id: String,
    /// False only while no snapshot has ever been published.
    pub available: bool,
    #[serde(flatten)]
    pub state: SensorState,
}

impl SensorReport {
    /// Evaluate one sensor against the current snapshot.
    #[must_use]
    pub fn compute(sensor: &Sensor, snapshot: Option<&PollSnapshot>) -> Self {
        Self {
            unique_id: sensor.unique_id(),
            object_id: sensor.object_id(),
            available: snapshot.is_some(),
            state: sensor.evaluate(snapshot),
        }
    }

    /// The wire state string: `unavailable` before the first snapshot,
    /// `unknown` for readings without a value.
    #[must_use]
    pub fn state_str(&self) -> &str {
        if !self.available {
            return "unavailable";
        }
        self.state.value.as_deref().unwrap_or("unknown")
    }
}

/// Everything one entry derived in one poll cycle.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct SensorBatch {
    /// Entry title, for logs.
    pub entry: String,
    /// False when the cycle behind this batch failed and the values were
    /// re-derived from the retained snapshot.
    pub fresh: bool,
    pub reports: Vec<SensorReport>,
}

/// Receives derived sensor values after every completed poll cycle.
///
/// Push failures are reported back to the caller, which logs them and
/// moves on; a sink error never stops the poll loop.
#[async_trait]
pub trait StateSink: Send + Sync + 'static {
    async fn push(&self, batch: &SensorBatch) -> BridgeResult<()>;
}

/// Fans every batch out to several sinks, in configuration order.
///
/// Every sink sees every batch: a failing sink does not stop the
/// fan-out, and the first error is returned once all deliveries were
/// attempted.
pub struct SinkSet {
    sinks: Vec<Arc<dyn StateSink>>,
}

impl SinkSet {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn StateSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl StateSink for SinkSet {
    async fn push(&self, batch: &SensorBatch) -> BridgeResult<()> {
        let mut first_failure = None;
        for sink in &self.sinks {
            if let Err(err) = sink.push(batch).await {
                // the first failure goes back to the caller, which logs it
                if first_failure.is_none() {
                    first_failure = Some(err);
                } else {
                    ::log::warn!("[{}] State push failed: {err}", batch.entry);
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::BridgeError;
    use crate::model::Session;
    use crate::sensor::player_sensors;

    fn sample_snapshot() -> PollSnapshot {
        let body = r#"[{"rk":"vs_10","suspend":0,"players":{"1":{"fc":"1234","ev":5000}}}]"#;
        let sessions: Vec<Session> = serde_json::from_str(body).unwrap();
        PollSnapshot::from_sessions(sessions)
    }

    struct CountingSink {
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl StateSink for CountingSink {
        async fn push(&self, _batch: &SensorBatch) -> BridgeResult<()> {
            self.pushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl StateSink for FailingSink {
        async fn push(&self, _batch: &SensorBatch) -> BridgeResult<()> {
            Err(BridgeError::service_error("sink is down"))
        }
    }

    #[test]
    fn state_str_maps_availability_and_missing_values() {
        let snapshot = sample_snapshot();
        let vr_pts = &player_sensors("1234", None)[2];

        let report = SensorReport::compute(vr_pts, Some(&snapshot));
        assert_eq!(report.state_str(), "5000");

        // no snapshot at all: unavailable wins over unknown
        let report = SensorReport::compute(vr_pts, None);
        assert_eq!(report.state_str(), "unavailable");

        // snapshot present but the player has no rating
        let unrated = sample_snapshot();
        let other = &player_sensors("9999", None)[2];
        let report = SensorReport::compute(other, Some(&unrated));
        assert!(report.available);
        assert_eq!(report.state_str(), "unknown");
    }

    #[test]
    fn report_serializes_to_the_documented_shape() {
        let snapshot = sample_snapshot();
        let status = &player_sensors("1234", None)[0];

        let report = SensorReport::compute(status, Some(&snapshot));
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["unique_id"], json!("1234_status"));
        assert_eq!(value["object_id"], json!("rwfc_1234_status"));
        assert_eq!(value["available"], json!(true));
        assert_eq!(value["value"], json!("ongoing_race"));
        assert_eq!(value["attributes"]["icon"], json!("mdi:information-outline"));
    }

    #[tokio::test]
    async fn sink_set_pushes_to_every_sink() {
        let first = Arc::new(CountingSink {
            pushes: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingSink {
            pushes: AtomicUsize::new(0),
        });
        let set = SinkSet::new(vec![first.clone(), second.clone()]);

        let batch = SensorBatch {
            entry: "test".to_string(),
            fresh: true,
            reports: Vec::new(),
        };
        set.push(&batch).await.unwrap();

        assert_eq!(first.pushes.load(Ordering::Relaxed), 1);
        assert_eq!(second.pushes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn sink_set_keeps_pushing_past_a_failing_sink() {
        let counting = Arc::new(CountingSink {
            pushes: AtomicUsize::new(0),
        });
        let set = SinkSet::new(vec![Arc::new(FailingSink), counting.clone()]);

        let batch = SensorBatch {
            entry: "test".to_string(),
            fresh: true,
            reports: Vec::new(),
        };
        let err = set.push(&batch).await.unwrap_err();

        // the sink after the failing one still received the batch
        assert_eq!(counting.pushes.load(Ordering::Relaxed), 1);
        assert!(err.to_string().contains("sink is down"));
    }
}

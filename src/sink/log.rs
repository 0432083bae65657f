use async_trait::async_trait;

use crate::error::BridgeResult;

use super::{SensorBatch, StateSink};

/// Fallback sink used when no Home Assistant server is configured: every
/// batch goes to the log and nowhere else.
pub struct LogSink;

#[async_trait]
impl StateSink for LogSink {
    async fn push(&self, batch: &SensorBatch) -> BridgeResult<()> {
        let freshness = if batch.fresh { "fresh" } else { "stale" };
        log::debug!(
            "[{}] {} sensor states ({freshness})",
            batch.entry,
            batch.reports.len()
        );
        for report in &batch.reports {
            log::debug!(
                "[{}]   sensor.{} = {}",
                batch.entry,
                report.object_id,
                report.state_str()
            );
        }
        Ok(())
    }
}

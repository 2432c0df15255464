use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use super::FlushMetaStore;
use super::RaftLogFlusher;
use crate::metrics::FLUSH_DURATION_METRIC;
use crate::Journal;
use crate::Result;

/// Flushes the journal synchronously on every request.
pub struct DirectFlusher {
    meta_store: Arc<dyn FlushMetaStore>,
    partition: String,
}

impl DirectFlusher {
    pub fn new(
        meta_store: Arc<dyn FlushMetaStore>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            meta_store,
            partition: partition.into(),
        }
    }
}

impl RaftLogFlusher for DirectFlusher {
    fn flush(
        &mut self,
        journal: &Arc<dyn Journal>,
    ) -> Result<()> {
        flush_journal(journal.as_ref(), self.meta_store.as_ref(), &self.partition, "direct").map(|_| ())
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Flushes `journal` and publishes the last index observed before the flush.
///
/// Entries appended while the flush runs are not covered, so the watermark
/// never runs ahead of what is durable.
pub(crate) fn flush_journal(
    journal: &dyn Journal,
    meta_store: &dyn FlushMetaStore,
    partition: &str,
    strategy: &str,
) -> Result<u64> {
    let last_index = journal.last_index();

    let start = Instant::now();
    journal.flush()?;
    FLUSH_DURATION_METRIC
        .with_label_values(&[partition, strategy])
        .observe(start.elapsed().as_secs_f64() * 1000.0);

    meta_store.store_last_flushed_index(last_index)?;
    trace!(last_index, strategy, "flushed journal");
    Ok(last_index)
}

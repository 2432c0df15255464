use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;

use super::direct::flush_journal;
use super::FlushMetaStore;
use super::RaftLogFlusher;
use crate::metrics::DELAYED_FLUSH_FAILURES_METRIC;
use crate::Error;
use crate::Journal;
use crate::Result;

/// Coalesces flush requests into a single journal flush `delay` after the
/// first request.
///
/// At most one flush task is pending at any time; a finished task handle
/// counts as nothing pending. The journal sync itself runs on the blocking
/// pool of `runtime`. A failed task is reported as [`Error::Fatal`] by the
/// next `flush` or `close`.
pub struct DelayedFlusher {
    delay: Duration,
    meta_store: Arc<dyn FlushMetaStore>,
    runtime: Handle,
    cancel: CancellationToken,
    pending: Option<JoinHandle<Result<()>>>,
    partition: String,
}

impl DelayedFlusher {
    pub fn new(
        delay: Duration,
        meta_store: Arc<dyn FlushMetaStore>,
        runtime: Handle,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            delay,
            meta_store,
            runtime,
            cancel: CancellationToken::new(),
            pending: None,
            partition: partition.into(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True while a scheduled flush has not completed yet.
    pub fn has_pending_flush(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Clears a finished task and surfaces its failure.
    fn reap_finished(&mut self) -> Result<()> {
        if !self.pending.as_ref().is_some_and(|handle| handle.is_finished()) {
            return Ok(());
        }
        let Some(mut handle) = self.pending.take() else {
            return Ok(());
        };

        match (&mut handle).now_or_never() {
            None => {
                self.pending = Some(handle);
                Ok(())
            }
            Some(Ok(result)) => result.map_err(|e| Error::Fatal(format!("delayed flush failed: {e}"))),
            Some(Err(join_error)) if join_error.is_cancelled() => Ok(()),
            Some(Err(join_error)) => Err(Error::Fatal(format!("delayed flush task failed: {join_error}"))),
        }
    }

    fn schedule(
        &mut self,
        journal: &Arc<dyn Journal>,
    ) {
        let journal = journal.clone();
        let meta_store = self.meta_store.clone();
        let cancel = self.cancel.clone();
        let delay = self.delay;
        let partition = self.partition.clone();

        let handle = self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }

            if cancel.is_cancelled() || !journal.is_open() {
                debug!("Skipping delayed flush of closed journal");
                return Ok(());
            }

            let blocking_partition = partition.clone();
            let flushed = tokio::task::spawn_blocking(move || {
                flush_journal(journal.as_ref(), meta_store.as_ref(), &blocking_partition, "delayed")
            })
            .await
            .unwrap_or_else(|join_error| Err(Error::Fatal(format!("delayed flush panicked: {join_error}"))));

            match flushed {
                Ok(last_index) => {
                    trace!(last_index, "Delayed flush completed");
                    Ok(())
                }
                Err(e) => {
                    error!(%partition, "Delayed flush failed: {:?}", e);
                    DELAYED_FLUSH_FAILURES_METRIC.with_label_values(&[partition.as_str()]).inc();
                    Err(e)
                }
            }
        });
        self.pending = Some(handle);
    }
}

impl RaftLogFlusher for DelayedFlusher {
    fn flush(
        &mut self,
        journal: &Arc<dyn Journal>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!("Flush requested on closed delayed flusher");
            return Ok(());
        }

        self.reap_finished()?;
        if self.pending.is_some() {
            trace!("Flush coalesced into pending delayed flush");
            return Ok(());
        }

        self.schedule(journal);
        Ok(())
    }

    fn is_direct(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        let result = self.reap_finished();
        self.pending = None;
        result
    }
}

impl Drop for DelayedFlusher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Flush strategies.
//!
//! A [`RaftLogFlusher`] decides what a `flush` request on the raft log means
//! for durability:
//! - [`DirectFlusher`]: flushes the journal before returning
//! - [`NoopFlusher`]: leaves flushing to the OS
//! - [`DelayedFlusher`]: coalesces requests into one flush after a fixed delay

mod delayed;
mod direct;
mod noop;

#[cfg(test)]
mod flush_test;

use std::sync::Arc;
use std::time::Duration;

pub use delayed::*;
pub use direct::*;
#[cfg(test)]
use mockall::automock;
pub use noop::*;
use tokio::runtime::Handle;

use crate::Error;
use crate::FlushConfig;
use crate::Journal;
use crate::Result;

/// Sink of the flush watermark: the last index known to be durable.
#[cfg_attr(test, automock)]
pub trait FlushMetaStore: Send + Sync + 'static {
    fn store_last_flushed_index(
        &self,
        index: u64,
    ) -> Result<()>;
}

/// Durability policy invoked on every flush request of the raft log.
///
/// Flushers are owned by a single raft log; `&mut self` receivers keep calls
/// from overlapping.
pub trait RaftLogFlusher: Send + 'static {
    fn flush(
        &mut self,
        journal: &Arc<dyn Journal>,
    ) -> Result<()>;

    /// True when `flush` returns only after the journal is durable.
    fn is_direct(&self) -> bool;

    /// Cancels any scheduled work. Reports a failure of work that already ran.
    fn close(&mut self) -> Result<()>;
}

/// Builds the flusher for `config`. A delayed flusher runs its task on
/// `runtime`, or on the current tokio runtime when none is given.
pub fn build_flusher(
    config: FlushConfig,
    meta_store: Arc<dyn FlushMetaStore>,
    runtime: Option<Handle>,
    partition: &str,
) -> Result<Box<dyn RaftLogFlusher>> {
    let flusher: Box<dyn RaftLogFlusher> = match config {
        FlushConfig::Direct => Box::new(DirectFlusher::new(meta_store, partition)),
        FlushConfig::Noop => Box::new(NoopFlusher),
        FlushConfig::Delayed { delay_ms } => {
            if delay_ms == 0 {
                return Err(Error::invalid_config("flush.delay_ms must be greater than 0"));
            }
            let runtime = match runtime {
                Some(handle) => handle,
                None => Handle::try_current()
                    .map_err(|_| Error::invalid_config("delayed flush requires a tokio runtime handle"))?,
            };
            Box::new(DelayedFlusher::new(
                Duration::from_millis(delay_ms),
                meta_store,
                runtime,
                partition,
            ))
        }
    };
    Ok(flusher)
}

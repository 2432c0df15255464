use std::sync::Arc;

use super::RaftLogFlusher;
use crate::Journal;
use crate::Result;

/// Never flushes; durability is left to the OS page cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFlusher;

impl RaftLogFlusher for NoopFlusher {
    fn flush(
        &mut self,
        _journal: &Arc<dyn Journal>,
    ) -> Result<()> {
        Ok(())
    }

    fn is_direct(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

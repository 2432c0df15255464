//! Replicated log storage for a raft partition.
//!
//! [`RaftLog`] appends entries to a [`Journal`], tracks the commit index and
//! hands out [`RaftLogReader`]s that either see every entry or stop at the
//! commit index. Durability is governed by a [`RaftLogFlusher`] picked from
//! [`FlushConfig`].

mod config;
mod constants;
mod entry;
mod errors;
mod flush;
mod journal;
mod log;
mod meta_store;
pub mod metrics;

pub use self::config::*;
pub use constants::ASQN_IGNORE;
pub use entry::*;
pub use errors::*;
pub use flush::*;
pub use journal::*;
pub use log::*;
pub use meta_store::*;

#[cfg(test)]
mod errors_test;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;

//! Log entry model: the tagged entry variants, their binary codec and the
//! journal-indexed wrapper handed out by the log and its readers.

mod byte_view;
pub mod codec;
mod indexed_entry;
mod raft_log_entry;
mod records;

#[cfg(test)]
mod codec_test;

pub use byte_view::*;
pub use indexed_entry::*;
pub use raft_log_entry::*;
pub use records::*;

//! The raft log: append, commit tracking, truncation and readers on top of a
//! [`Journal`](crate::Journal).

mod builder;
mod raft_log;
mod reader;


pub use builder::*;
pub use raft_log::*;
pub use reader::*;

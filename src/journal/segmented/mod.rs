mod segment;
mod segmented_journal;
mod sparse_index;


pub use segmented_journal::*;

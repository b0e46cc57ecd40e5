//! Merge machinery: ancestry and merge-base search, the three-way tree
//! merge with its resolution table, conflict marker materialization, and
//! the on-disk state of an in-progress merge.

pub mod diff3;
pub mod markers;
pub mod merge_base;
pub mod state;
pub mod threeway;

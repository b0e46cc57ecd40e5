//! Diff engines: Myers line diff, unified hunks, and recursive tree
//! comparison.

pub mod hunk;
pub mod myers;
pub mod tree_diff;

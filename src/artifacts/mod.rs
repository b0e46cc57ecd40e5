//! Data structures and algorithms
//!
//! - `branch`: reference names and revision expressions
//! - `checkout`: workspace migration between snapshots
//! - `core`: error taxonomy
//! - `database`: tree-entry value types
//! - `diff`: Myers line diff, unified hunks, tree diffing
//! - `index`: staging-index wire format and conflict stages
//! - `log`: history traversal and path filtering
//! - `merge`: merge base, three-way merge, markers, merge state
//! - `objects`: object model (blob, tree, commit, tag)
//! - `status`: working-tree status classification

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod status;

//! sctl: a content-addressed source-control core
//!
//! The crate records a working directory's evolution as an immutable DAG
//! of commits, each pointing to a fully materialized tree snapshot whose
//! leaves are deduplicated file contents. It decomposes into:
//!
//! - `areas`: the coordination surfaces (repository, object database,
//!   index, refs, workspace, config)
//! - `artifacts`: the data structures and algorithms beneath them
//! - `commands`: one `impl Repository` block per user-facing operation

pub mod areas;
pub mod artifacts;
pub mod commands;

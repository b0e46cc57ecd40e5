//! Error taxonomy for source-control operations.
//!
//! Core code propagates `anyhow::Error` for its context chains, but every
//! failure that callers may want to branch on is constructed from one of the
//! variants below. Use `err.downcast_ref::<SourceError>()` to recover the
//! typed form from an `anyhow::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// The typed error carried inside `anyhow::Error` for failures callers can
/// distinguish.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No repository root was found walking upward from the start directory.
    #[error("not a source repository (or any parent up to filesystem root): {start}")]
    NotARepository { start: PathBuf },

    /// An object's framed header did not parse.
    #[error("malformed object: {reason}")]
    MalformedObject { reason: String },

    /// An object decoded fine but its recomputed digest disagreed with its key.
    #[error("corrupt object {oid}: digest mismatch")]
    CorruptObject { oid: String },

    /// An abbreviated digest matched more than one object.
    #[error("ambiguous digest prefix '{prefix}' ({count} candidates)")]
    AmbiguousDigest { prefix: String, count: usize },

    /// A digest or digest prefix matched no object.
    #[error("unknown digest: {digest}")]
    UnknownDigest { digest: String },

    /// The index file failed header, version, or checksum validation.
    #[error("corrupt index: {reason}")]
    CorruptIndex { reason: String },

    /// A reference does not exist.
    #[error("reference not found: {name}")]
    RefNotFound { name: String },

    /// A symbolic reference chain exceeded the resolution depth limit.
    #[error("symbolic reference cycle while resolving {name}")]
    RefCycle { name: String },

    /// A compare-and-set reference update observed a different old value.
    #[error("reference {name} changed concurrently")]
    RefRace { name: String },

    /// A reference name violates the naming rules.
    #[error("invalid reference name: {name}")]
    InvalidRefName { name: String },

    /// A graph walk dereferenced a digest absent from the object store.
    #[error("missing object {oid} reached from {context}")]
    MissingObject { oid: String, context: String },

    /// A path given to the index escapes the repository root.
    #[error("path is outside the repository: {path}")]
    PathOutsideRepo { path: PathBuf },

    /// A path is not addressable (empty, `.`/`..` components, bad encoding).
    #[error("invalid path: {path}")]
    InvalidPath { path: PathBuf },

    /// A merge finished with unresolved conflicts.
    #[error("merge produced {} conflicted path(s)", paths.len())]
    MergeConflict { paths: Vec<String> },

    /// The index matches HEAD's tree and no merge is pending.
    #[error("nothing to commit")]
    NothingToCommit,

    /// The commit message was empty after trimming.
    #[error("empty commit message")]
    EmptyCommitMessage,

    /// A revert target has no parent to invert against.
    #[error("cannot revert initial commit {oid}")]
    CannotRevertInitial { oid: String },

    /// A revert target is a merge commit.
    #[error("cannot revert merge commit {oid}")]
    CannotRevertMerge { oid: String },

    /// A fast-forward was requested but the target does not descend from HEAD.
    #[error("not a fast-forward: {from} -> {to}")]
    NotFastForward { from: String, to: String },

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn malformed_object(reason: impl Into<String>) -> Self {
        SourceError::MalformedObject {
            reason: reason.into(),
        }
    }

    pub fn corrupt_index(reason: impl Into<String>) -> Self {
        SourceError::CorruptIndex {
            reason: reason.into(),
        }
    }

    pub fn missing_object(oid: impl Into<String>, context: impl Into<String>) -> Self {
        SourceError::MissingObject {
            oid: oid.into(),
            context: context.into(),
        }
    }
}

/// Look through an `anyhow` chain for the typed error, if any.
pub fn as_source_error(err: &anyhow::Error) -> Option<&SourceError> {
    err.chain().find_map(|cause| cause.downcast_ref())
}

//! Commit history walk
//!
//! Produces commits reachable from a start digest in reverse chronological
//! order: a best-first frontier ordered on committer time, with a visited
//! set so diamond shapes emit each commit once. First-parent mode follows
//! only the mainline. Cancellation is checked at the top of every frontier
//! expansion.

use crate::areas::database::Database;
use crate::artifacts::core::error::{SourceError, as_source_error};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashSet};
use tokio_util::sync::CancellationToken;

/// Knobs for a history walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Emit at most this many commits
    pub limit: Option<usize>,
    /// Follow only the first parent of each commit
    pub first_parent: bool,
}

/// Iterator over commits, newest committer time first.
pub struct RevList<'r> {
    database: &'r Database,
    frontier: BinaryHeap<(DateTime<FixedOffset>, ObjectId)>,
    visited: HashSet<ObjectId>,
    emitted: usize,
    options: WalkOptions,
    cancel: CancellationToken,
}

impl<'r> RevList<'r> {
    pub fn new(
        database: &'r Database,
        start: ObjectId,
        options: WalkOptions,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let mut walk = RevList {
            database,
            frontier: BinaryHeap::new(),
            visited: HashSet::new(),
            emitted: 0,
            options,
            cancel,
        };
        walk.push(start)?;
        Ok(walk)
    }

    fn push(&mut self, oid: ObjectId) -> anyhow::Result<()> {
        if !self.visited.insert(oid) {
            return Ok(());
        }

        let commit = self.load(&oid)?;
        self.frontier.push((commit.timestamp(), oid));
        Ok(())
    }

    fn load(&self, oid: &ObjectId) -> anyhow::Result<Commit> {
        self.database.load_commit(oid).map_err(|err| {
            if matches!(as_source_error(&err), Some(SourceError::UnknownDigest { .. })) {
                SourceError::missing_object(oid.to_hex(), "history walk").into()
            } else {
                err
            }
        })
    }

    fn step(&mut self) -> anyhow::Result<Option<Commit>> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled.into());
        }

        let Some((_, oid)) = self.frontier.pop() else {
            return Ok(None);
        };

        let commit = self.load(&oid)?;

        if self.options.first_parent {
            if let Some(parent) = commit.first_parent() {
                self.push(*parent)?;
            }
        } else {
            for parent in commit.parents() {
                self.push(*parent)?;
            }
        }

        self.emitted += 1;
        Ok(Some(commit))
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(limit) = self.options.limit
            && self.emitted >= limit
        {
            return None;
        }

        self.step().transpose()
    }
}

//! Ancestry tests and best-common-ancestor search
//!
//! The merge base of two commits is a best common ancestor: a common
//! ancestor that is not itself an ancestor of another common ancestor. The
//! search runs in two phases:
//!
//! 1. A bidirectional traversal over both histories, processed newest
//!    committer time first, marking each commit with the side(s) it was
//!    reached from. Commits reached from both sides are common ancestors.
//! 2. A minimality filter: from every common ancestor, walk its proper
//!    ancestors (all of which are common) and mark them redundant. What
//!    survives is the set of best common ancestors.
//!
//! Criss-cross histories yield several incomparable best bases; the
//! single-base entry point picks the one with the newest committer time,
//! tie-broken by smallest digest, so the answer is deterministic.

use crate::areas::database::{CommitCache, Database};
use crate::artifacts::core::error::SourceError;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct VisitState: u8 {
        const SOURCE = 0b01;
        const TARGET = 0b10;
        const BOTH = Self::SOURCE.bits() | Self::TARGET.bits();
    }
}

/// Graph queries over the commit DAG.
pub struct MergeBaseFinder<'r> {
    database: &'r Database,
    cache: CommitCache,
}

impl<'r> MergeBaseFinder<'r> {
    pub fn new(database: &'r Database) -> Self {
        MergeBaseFinder {
            database,
            cache: CommitCache::new(),
        }
    }

    /// Whether `a` is in the ancestor closure of `b` (true when `a == b`).
    pub fn is_ancestor(
        &self,
        a: &ObjectId,
        b: &ObjectId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        if a == b {
            return Ok(true);
        }

        let mut queue = VecDeque::from([*b]);
        let mut seen = HashSet::from([*b]);

        while let Some(oid) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled.into());
            }

            let commit = self.cache.get_or_load(self.database, &oid)?;
            for parent in &commit.parents {
                if parent == a {
                    return Ok(true);
                }
                if seen.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }

        Ok(false)
    }

    /// A ref can fast-forward from `from` to `to` iff `from` is an ancestor
    /// of `to`.
    pub fn can_fast_forward(
        &self,
        from: &ObjectId,
        to: &ObjectId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        self.is_ancestor(from, to, cancel)
    }

    /// All best common ancestors of two commits, in digest order.
    pub fn find_all_bases(
        &self,
        a: &ObjectId,
        b: &ObjectId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let common = self.find_common_ancestors(a, b, cancel)?;
        if common.is_empty() {
            return Ok(Vec::new());
        }

        // Every proper ancestor of a common ancestor is itself common, so
        // the redundancy walk never has to leave the common set.
        let common_set: HashSet<ObjectId> = common.iter().copied().collect();
        let mut redundant: HashSet<ObjectId> = HashSet::new();

        for candidate in &common {
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled.into());
            }

            let commit = self.cache.get_or_load(self.database, candidate)?;
            let mut queue: VecDeque<ObjectId> = commit.parents.iter().copied().collect();
            let mut seen: HashSet<ObjectId> = HashSet::new();

            while let Some(oid) = queue.pop_front() {
                if !seen.insert(oid) {
                    continue;
                }
                if common_set.contains(&oid) {
                    redundant.insert(oid);
                }

                let commit = self.cache.get_or_load(self.database, &oid)?;
                queue.extend(commit.parents.iter().copied());
            }
        }

        let mut best: Vec<ObjectId> = common
            .into_iter()
            .filter(|oid| !redundant.contains(oid))
            .collect();
        best.sort();
        Ok(best)
    }

    /// One best common ancestor, or `None` when the histories are
    /// unrelated. When several incomparable bases exist, the newest
    /// committer time wins, tie-broken by smallest digest.
    pub fn find_best(
        &self,
        a: &ObjectId,
        b: &ObjectId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<ObjectId>> {
        let bases = self.find_all_bases(a, b, cancel)?;

        let mut best: Option<(DateTime<FixedOffset>, ObjectId)> = None;
        for oid in bases {
            let commit = self.cache.get_or_load(self.database, &oid)?;
            let candidate = (commit.timestamp, oid);

            best = match best {
                None => Some(candidate),
                Some(current) => {
                    // newer timestamp wins; on a tie the smaller digest does
                    if candidate.0 > current.0 || (candidate.0 == current.0 && candidate.1 < current.1)
                    {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        Ok(best.map(|(_, oid)| oid))
    }

    /// Phase 1: commits reachable from both sides.
    fn find_common_ancestors(
        &self,
        a: &ObjectId,
        b: &ObjectId,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<ObjectId>> {
        if a == b {
            return Ok(vec![*a]);
        }

        let mut states: HashMap<ObjectId, VisitState> = HashMap::new();
        let mut frontier: BinaryHeap<(DateTime<FixedOffset>, ObjectId)> = BinaryHeap::new();

        for (oid, side) in [(a, VisitState::SOURCE), (b, VisitState::TARGET)] {
            let commit = self.cache.get_or_load(self.database, oid)?;
            states.insert(*oid, side);
            frontier.push((commit.timestamp, *oid));
        }

        while let Some((_, oid)) = frontier.pop() {
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled.into());
            }

            let state = states.get(&oid).copied().unwrap_or(VisitState::empty());
            let commit = self.cache.get_or_load(self.database, &oid)?;

            for parent_oid in &commit.parents {
                let parent_state = states
                    .get(parent_oid)
                    .copied()
                    .unwrap_or(VisitState::empty());

                // only re-queue a parent when it learns a new side
                if !parent_state.contains(state) {
                    let parent = self.cache.get_or_load(self.database, parent_oid)?;
                    states.insert(*parent_oid, parent_state | state);
                    frontier.push((parent.timestamp, *parent_oid));
                }
            }
        }

        Ok(states
            .into_iter()
            .filter(|(_, state)| state.contains(VisitState::BOTH))
            .map(|(oid, _)| oid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::commit::Commit;
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::person::{Person, parse_epoch_tz};
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let temp = TempDir::new().expect("temp dir");
        let database = Database::new(temp.path().join("objects").into_boxed_path());
        (temp, database)
    }

    fn commit_at(database: &Database, parents: Vec<ObjectId>, epoch: i64) -> ObjectId {
        let tree = Tree::try_new(Vec::new()).unwrap();
        database.store(&tree).unwrap();

        let author = Person::new_with_timestamp(
            "T".to_string(),
            "t@x".to_string(),
            parse_epoch_tz(epoch, "+0000").unwrap(),
        );
        let commit = Commit::try_new_authored(
            parents,
            tree.object_id().unwrap(),
            author,
            format!("c{}", epoch),
        )
        .unwrap();
        database.store(&commit).unwrap()
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[rstest]
    fn test_ancestry_in_linear_history(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let c0 = commit_at(&database, vec![], 100);
        let c1 = commit_at(&database, vec![c0], 200);
        let c2 = commit_at(&database, vec![c1], 300);

        let finder = MergeBaseFinder::new(&database);

        assert!(finder.is_ancestor(&c0, &c2, &token()).unwrap());
        assert!(finder.is_ancestor(&c2, &c2, &token()).unwrap());
        assert!(!finder.is_ancestor(&c2, &c0, &token()).unwrap());

        // fast-forward mirrors ancestry exactly
        assert!(finder.can_fast_forward(&c0, &c2, &token()).unwrap());
        assert!(!finder.can_fast_forward(&c2, &c0, &token()).unwrap());
    }

    #[rstest]
    fn test_diamond_base(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let c0 = commit_at(&database, vec![], 100);
        let c1 = commit_at(&database, vec![c0], 200);
        let c2 = commit_at(&database, vec![c0], 300);
        let merge = commit_at(&database, vec![c1, c2], 400);

        let finder = MergeBaseFinder::new(&database);

        assert_eq!(finder.find_best(&c1, &c2, &token()).unwrap(), Some(c0));
        assert_eq!(
            finder.find_best(&merge, &c1, &token()).unwrap(),
            Some(c1)
        );
    }

    #[rstest]
    fn test_linear_base_is_older_commit(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let c0 = commit_at(&database, vec![], 100);
        let c1 = commit_at(&database, vec![c0], 200);

        let finder = MergeBaseFinder::new(&database);

        assert_eq!(finder.find_best(&c0, &c1, &token()).unwrap(), Some(c0));
    }

    #[rstest]
    fn test_criss_cross_has_two_best_bases(database: (TempDir, Database)) {
        let (_temp, database) = database;
        // c0 -> {a1, b1}; a2 merges (a1, b1); b2 merges (b1, a1)
        let c0 = commit_at(&database, vec![], 100);
        let a1 = commit_at(&database, vec![c0], 200);
        let b1 = commit_at(&database, vec![c0], 250);
        let a2 = commit_at(&database, vec![a1, b1], 300);
        let b2 = commit_at(&database, vec![b1, a1], 350);

        let finder = MergeBaseFinder::new(&database);

        let mut expected = vec![a1, b1];
        expected.sort();
        assert_eq!(finder.find_all_bases(&a2, &b2, &token()).unwrap(), expected);

        // deterministic single answer: newest committer time wins
        assert_eq!(finder.find_best(&a2, &b2, &token()).unwrap(), Some(b1));
    }

    #[rstest]
    fn test_unrelated_histories_have_no_base(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let a = commit_at(&database, vec![], 100);
        let b = commit_at(&database, vec![], 200);

        let finder = MergeBaseFinder::new(&database);

        assert_eq!(finder.find_best(&a, &b, &token()).unwrap(), None);
        assert!(!finder.is_ancestor(&a, &b, &token()).unwrap());
    }

    #[rstest]
    fn test_cancellation_is_propagated(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let c0 = commit_at(&database, vec![], 100);
        let c1 = commit_at(&database, vec![c0], 200);

        let cancelled = CancellationToken::new();
        cancelled.cancel();

        let finder = MergeBaseFinder::new(&database);
        let err = finder.is_ancestor(&c0, &c1, &cancelled).unwrap_err();
        assert!(matches!(
            crate::artifacts::core::error::as_source_error(&err),
            Some(SourceError::Cancelled)
        ));
    }
}

//! Three-way tree merge
//!
//! Merges a base tree, our tree, and their tree into a flat set of merged
//! entries plus per-path conflicts. Directory pairs recurse; the resolution
//! table applies once entries reach blob level; a directory on one side
//! facing a file on the other is always a conflict.
//!
//! For each path, with `b`, `o`, `t` the (possibly absent) entries:
//!
//! | b | o | t | decision |
//! |---|---|---|----------|
//! | = | = | =  | keep o |
//! | = | = | ≠  | take t |
//! | = | ≠ | =  | keep o |
//! | - | o | -  | take o |
//! | - | - | t  | take t |
//! | any | o | t, o=t | keep o |
//! | - | o | t, o≠t | add/add conflict |
//! | b | - | = b | accept delete |
//! | b | = b | - | accept delete |
//! | b | - | ≠ b | delete/modify conflict |
//! | b | ≠ b | - | modify/delete conflict |
//! | b | ≠ | ≠, o≠t | modify/modify conflict |

use crate::areas::database::Database;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeBuilder};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// How a path came to be conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides modified the same base content differently
    ModifyModify,
    /// Both sides added different content
    AddAdd,
    /// Ours deleted while theirs modified
    DeleteModify,
    /// Ours modified while theirs deleted
    ModifyDelete,
    /// A directory on one side faces a file on the other
    KindMismatch,
}

/// One conflicted path with its three stage entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Canonical `/`-separated path
    pub path: String,
    pub kind: ConflictKind,
    /// Stage 1: base entry, when the path existed in the base
    pub base: Option<DatabaseEntry>,
    /// Stage 2: our entry
    pub ours: Option<DatabaseEntry>,
    /// Stage 3: their entry
    pub theirs: Option<DatabaseEntry>,
}

/// How blob-level content conflicts are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    /// Materialize markers and index stages, report `MergeConflict`
    #[default]
    Fail,
    /// Keep our side's blob
    Ours,
    /// Take their side's blob
    Theirs,
    /// Concatenate ours then theirs into a new blob
    Union,
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "fail" => Ok(ResolutionStrategy::Fail),
            "ours" => Ok(ResolutionStrategy::Ours),
            "theirs" => Ok(ResolutionStrategy::Theirs),
            "union" => Ok(ResolutionStrategy::Union),
            _ => anyhow::bail!("unknown resolution strategy '{}'", value),
        }
    }
}

/// Outcome of the tree-level merge walk.
#[derive(Debug, Default)]
pub struct MergeResult {
    /// Auto-merged leaf entries by path; conflicted paths keep the
    /// surviving side (ours when both survive) pending resolution
    pub entries: BTreeMap<String, DatabaseEntry>,
    /// Per-path conflicts, in path order
    pub conflicts: Vec<Conflict>,
}

impl MergeResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicted_paths(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.path.clone()).collect()
    }
}

/// Three-way merger over the object database.
pub struct ThreeWayMerger<'r> {
    database: &'r Database,
}

impl<'r> ThreeWayMerger<'r> {
    pub fn new(database: &'r Database) -> Self {
        ThreeWayMerger { database }
    }

    /// Merge three root trees (any may be absent).
    pub fn merge_trees(
        &self,
        base: Option<&ObjectId>,
        ours: Option<&ObjectId>,
        theirs: Option<&ObjectId>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<MergeResult> {
        let mut result = MergeResult::default();
        self.merge_at("", base, ours, theirs, cancel, &mut result)?;
        result.conflicts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(result)
    }

    /// Write the merged entries as tree objects, returning the root digest.
    pub fn write_tree(&self, entries: &BTreeMap<String, DatabaseEntry>) -> anyhow::Result<ObjectId> {
        let mut builder = TreeBuilder::new();
        for (path, entry) in entries {
            builder.insert(Path::new(path), entry.oid, entry.mode)?;
        }

        builder.finish(&mut |tree: &Tree| {
            self.database.store(tree)?;
            Ok(())
        })
    }

    fn merge_at(
        &self,
        prefix: &str,
        base: Option<&ObjectId>,
        ours: Option<&ObjectId>,
        theirs: Option<&ObjectId>,
        cancel: &CancellationToken,
        result: &mut MergeResult,
    ) -> anyhow::Result<()> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled.into());
        }

        let base_entries = self.load_entries(base)?;
        let our_entries = self.load_entries(ours)?;
        let their_entries = self.load_entries(theirs)?;

        let mut names: Vec<&String> = base_entries.keys().collect();
        for name in our_entries.keys().chain(their_entries.keys()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.sort();
        names.dedup();

        for name in names {
            let b = base_entries.get(name).copied();
            let o = our_entries.get(name).copied();
            let t = their_entries.get(name).copied();

            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            self.merge_entry(&path, b, o, t, cancel, result)?;
        }

        Ok(())
    }

    fn merge_entry(
        &self,
        path: &str,
        b: Option<DatabaseEntry>,
        o: Option<DatabaseEntry>,
        t: Option<DatabaseEntry>,
        cancel: &CancellationToken,
        result: &mut MergeResult,
    ) -> anyhow::Result<()> {
        let o_dir = o.is_some_and(|e| e.is_tree());
        let t_dir = t.is_some_and(|e| e.is_tree());

        // a directory facing a file never auto-merges
        if (o_dir && t.is_some() && !t_dir) || (t_dir && o.is_some() && !o_dir) {
            result.conflicts.push(Conflict {
                path: path.to_string(),
                kind: ConflictKind::KindMismatch,
                base: b,
                ours: o,
                theirs: t,
            });
            if let Some(o) = o.filter(|e| !e.is_tree()) {
                result.entries.insert(path.to_string(), o);
            }
            return Ok(());
        }

        // recurse while a directory is present on either surviving side
        if o_dir || t_dir {
            let b_subtree = b.filter(|e| e.is_tree()).map(|e| e.oid);
            let o_subtree = o.filter(|e| e.is_tree()).map(|e| e.oid);
            let t_subtree = t.filter(|e| e.is_tree()).map(|e| e.oid);

            // a base file facing directories contributes nothing below
            return self.merge_at(
                path,
                b_subtree.as_ref(),
                o_subtree.as_ref(),
                t_subtree.as_ref(),
                cancel,
                result,
            );
        }

        // a base directory whose both sides are now files/absent: the base
        // side is not comparable at blob level
        let b = b.filter(|e| !e.is_tree());

        let decision = match (b, o, t) {
            (_, None, None) => Decision::Omit,
            // both sides agree
            (_, Some(o), Some(t)) if o == t => Decision::Keep(o),
            // only one side has it, and the base never did
            (None, Some(o), None) => Decision::Keep(o),
            (None, None, Some(t)) => Decision::Keep(t),
            // both added different content
            (None, Some(o), Some(t)) => Decision::Conflict(ConflictKind::AddAdd, Some(o), Some(t)),
            // deletions against an unchanged base are accepted
            (Some(b), None, Some(t)) if b == t => Decision::Omit,
            (Some(b), Some(o), None) if b == o => Decision::Omit,
            // deletion races a modification
            (Some(_), None, Some(t)) => {
                Decision::Conflict(ConflictKind::DeleteModify, None, Some(t))
            }
            (Some(_), Some(o), None) => {
                Decision::Conflict(ConflictKind::ModifyDelete, Some(o), None)
            }
            // one side changed, the other did not
            (Some(b), Some(o), Some(t)) if b == o => Decision::Keep(t),
            (Some(b), Some(o), Some(t)) if b == t => Decision::Keep(o),
            // both changed, differently
            (Some(_), Some(o), Some(t)) => {
                Decision::Conflict(ConflictKind::ModifyModify, Some(o), Some(t))
            }
        };

        match decision {
            Decision::Omit => {}
            Decision::Keep(entry) => {
                result.entries.insert(path.to_string(), entry);
            }
            Decision::Conflict(kind, ours, theirs) => {
                // the surviving side (ours when both survive) stays in the
                // merged tree pending resolution
                if let Some(survivor) = ours.or(theirs) {
                    result.entries.insert(path.to_string(), survivor);
                }
                result.conflicts.push(Conflict {
                    path: path.to_string(),
                    kind,
                    base: b,
                    ours,
                    theirs,
                });
            }
        }

        Ok(())
    }

    fn load_entries(
        &self,
        oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<String, DatabaseEntry>> {
        match oid {
            None => Ok(BTreeMap::new()),
            Some(oid) => Ok(self.database.load_tree(oid)?.to_map()),
        }
    }
}

enum Decision {
    Omit,
    Keep(DatabaseEntry),
    Conflict(ConflictKind, Option<DatabaseEntry>, Option<DatabaseEntry>),
}

//! Tree diffing
//!
//! Compares two trees and produces a flat, path-ordered change set of
//! added, deleted, and modified files. Directory pairs recurse; a
//! directory/file swap shows up as the deletion of everything beneath the
//! directory plus the addition of the file (or vice versa). Paths use `/`
//! as the separator regardless of host.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeMap;

/// Kind of change detected for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added(DatabaseEntry),
    Deleted(DatabaseEntry),
    Modified {
        old: DatabaseEntry,
        new: DatabaseEntry,
    },
}

impl ChangeKind {
    pub fn old_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            ChangeKind::Deleted(entry) => Some(entry),
            ChangeKind::Modified { old, .. } => Some(old),
            ChangeKind::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            ChangeKind::Added(entry) => Some(entry),
            ChangeKind::Modified { new, .. } => Some(new),
            ChangeKind::Deleted(_) => None,
        }
    }

    pub fn status_char(&self) -> char {
        match self {
            ChangeKind::Added(_) => 'A',
            ChangeKind::Deleted(_) => 'D',
            ChangeKind::Modified { .. } => 'M',
        }
    }
}

/// Path → change, ordered by path.
pub type ChangeSet = BTreeMap<String, ChangeKind>;

/// Tree diff engine over the object database.
#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    changes: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            changes: BTreeMap::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }

    /// Compare two root trees (either side may be absent).
    pub fn compare(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        self.compare_at("", old, new)
    }

    fn compare_at(
        &mut self,
        prefix: &str,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_entries = self.load_entries(old)?;
        let new_entries = self.load_entries(new)?;

        let mut names: Vec<&String> = old_entries.keys().collect();
        for name in new_entries.keys() {
            if !old_entries.contains_key(name) {
                names.push(name);
            }
        }
        names.sort();

        for name in names {
            let old_entry = old_entries.get(name);
            let new_entry = new_entries.get(name);

            if old_entry == new_entry {
                continue;
            }

            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            let old_subtree = old_entry.filter(|e| e.is_tree()).map(|e| &e.oid);
            let new_subtree = new_entry.filter(|e| e.is_tree()).map(|e| &e.oid);

            if old_subtree.is_some() || new_subtree.is_some() {
                let old_subtree = old_subtree.copied();
                let new_subtree = new_subtree.copied();
                self.compare_at(&path, old_subtree.as_ref(), new_subtree.as_ref())?;
            }

            let old_blob = old_entry.filter(|e| !e.is_tree()).copied();
            let new_blob = new_entry.filter(|e| !e.is_tree()).copied();

            let change = match (old_blob, new_blob) {
                (None, Some(new)) => Some(ChangeKind::Added(new)),
                (Some(old), None) => Some(ChangeKind::Deleted(old)),
                (Some(old), Some(new)) if old != new => {
                    Some(ChangeKind::Modified { old, new })
                }
                _ => None,
            };

            if let Some(change) = change {
                self.changes.insert(path, change);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::entry_mode::EntryMode;
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::tree::{Tree, TreeEntry};
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let temp = TempDir::new().expect("temp dir");
        let database = Database::new(temp.path().join("objects").into_boxed_path());
        (temp, database)
    }

    fn store_blob(database: &Database, content: &str) -> ObjectId {
        database.store(&Blob::new(content.as_bytes().to_vec())).unwrap()
    }

    fn store_tree(database: &Database, entries: Vec<TreeEntry>) -> ObjectId {
        let tree = Tree::try_new(entries).unwrap();
        database.store(&tree).unwrap()
    }

    fn file(name: &str, oid: ObjectId) -> TreeEntry {
        TreeEntry::new(name.to_string(), DatabaseEntry::new(oid, EntryMode::Regular))
    }

    fn dir(name: &str, oid: ObjectId) -> TreeEntry {
        TreeEntry::new(
            name.to_string(),
            DatabaseEntry::new(oid, EntryMode::Directory),
        )
    }

    #[rstest]
    fn test_rename_appears_as_delete_plus_add(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let blob = store_blob(&database, "hello\n");
        let old_tree = store_tree(&database, vec![file("a.txt", blob)]);
        let new_tree = store_tree(&database, vec![file("b.txt", blob)]);

        let mut diff = TreeDiff::new(&database);
        diff.compare(Some(&old_tree), Some(&new_tree)).unwrap();

        let changes: Vec<(&String, char)> = diff
            .changes()
            .iter()
            .map(|(path, kind)| (path, kind.status_char()))
            .collect();
        assert_eq!(
            changes,
            vec![(&"a.txt".to_string(), 'D'), (&"b.txt".to_string(), 'A')]
        );
    }

    #[rstest]
    fn test_recursion_into_changed_directories(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let old_blob = store_blob(&database, "v1\n");
        let new_blob = store_blob(&database, "v2\n");

        let old_sub = store_tree(&database, vec![file("inner.txt", old_blob)]);
        let new_sub = store_tree(&database, vec![file("inner.txt", new_blob)]);
        let old_tree = store_tree(&database, vec![dir("sub", old_sub)]);
        let new_tree = store_tree(&database, vec![dir("sub", new_sub)]);

        let mut diff = TreeDiff::new(&database);
        diff.compare(Some(&old_tree), Some(&new_tree)).unwrap();

        assert_eq!(diff.changes().len(), 1);
        assert!(matches!(
            diff.changes().get("sub/inner.txt"),
            Some(ChangeKind::Modified { .. })
        ));
    }

    #[rstest]
    fn test_directory_replaced_by_file(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let blob = store_blob(&database, "content\n");
        let sub = store_tree(&database, vec![file("inner.txt", blob)]);
        let old_tree = store_tree(&database, vec![dir("x", sub)]);
        let new_tree = store_tree(&database, vec![file("x", blob)]);

        let mut diff = TreeDiff::new(&database);
        diff.compare(Some(&old_tree), Some(&new_tree)).unwrap();

        assert!(matches!(
            diff.changes().get("x/inner.txt"),
            Some(ChangeKind::Deleted(_))
        ));
        assert!(matches!(diff.changes().get("x"), Some(ChangeKind::Added(_))));
    }

    #[rstest]
    fn test_identical_trees_produce_nothing(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let blob = store_blob(&database, "same\n");
        let tree = store_tree(&database, vec![file("a.txt", blob)]);

        let mut diff = TreeDiff::new(&database);
        diff.compare(Some(&tree), Some(&tree)).unwrap();

        assert!(diff.changes().is_empty());
    }

    #[rstest]
    fn test_absent_side_yields_all_added(database: (TempDir, Database)) {
        let (_temp, database) = database;
        let blob = store_blob(&database, "new\n");
        let sub = store_tree(&database, vec![file("b.txt", blob)]);
        let tree = store_tree(&database, vec![file("a.txt", blob), dir("d", sub)]);

        let mut diff = TreeDiff::new(&database);
        diff.compare(None, Some(&tree)).unwrap();

        let paths: Vec<&String> = diff.changes().keys().collect();
        assert_eq!(paths, vec!["a.txt", "d/b.txt"]);
    }
}

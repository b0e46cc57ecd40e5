//! Working-tree status classification
//!
//! Compares three snapshots pairwise: the HEAD tree against the index
//! (changes to be committed), the index against the working tree (changes
//! not staged), and the working tree against everything tracked
//! (untracked files). Conflicted paths are reported separately as
//! unmerged.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::path_key;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything `status` reports, path-sorted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// In the index but not in HEAD's tree
    pub index_added: Vec<String>,
    /// Different digest or mode between HEAD's tree and the index
    pub index_modified: Vec<String>,
    /// In HEAD's tree but not in the index
    pub index_deleted: Vec<String>,
    /// Index entry whose working-tree file changed
    pub workspace_modified: Vec<String>,
    /// Index entry whose working-tree file is gone
    pub workspace_deleted: Vec<String>,
    /// Working-tree files the index knows nothing about
    pub untracked: Vec<String>,
    /// Paths with unresolved conflict stages
    pub unmerged: Vec<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.index_added.is_empty()
            && self.index_modified.is_empty()
            && self.index_deleted.is_empty()
            && self.workspace_modified.is_empty()
            && self.workspace_deleted.is_empty()
            && self.untracked.is_empty()
            && self.unmerged.is_empty()
    }
}

/// Flatten a tree to `path → entry` rows with `/`-separated paths.
pub fn flatten_tree(
    database: &Database,
    tree_oid: &ObjectId,
) -> anyhow::Result<BTreeMap<String, DatabaseEntry>> {
    let mut entries = BTreeMap::new();
    flatten_into(database, tree_oid, "", &mut entries)?;
    Ok(entries)
}

fn flatten_into(
    database: &Database,
    tree_oid: &ObjectId,
    prefix: &str,
    entries: &mut BTreeMap<String, DatabaseEntry>,
) -> anyhow::Result<()> {
    let tree = database.load_tree(tree_oid)?;

    for tree_entry in tree.entries() {
        let path = if prefix.is_empty() {
            tree_entry.name().to_string()
        } else {
            format!("{}/{}", prefix, tree_entry.name())
        };

        if tree_entry.is_tree() {
            flatten_into(database, tree_entry.oid(), &path, entries)?;
        } else {
            entries.insert(path, *tree_entry.entry());
        }
    }

    Ok(())
}

/// Produce the full status classification.
pub fn scan(
    database: &Database,
    workspace: &Workspace,
    index: &Index,
    head_tree: Option<&ObjectId>,
) -> anyhow::Result<StatusReport> {
    let mut report = StatusReport::default();

    let head_entries = match head_tree {
        Some(oid) => flatten_tree(database, oid)?,
        None => BTreeMap::new(),
    };

    for conflict in index.conflicts() {
        report.unmerged.push(conflict.path);
    }

    // HEAD tree vs index (changes to be committed)
    for entry in index.tracked_entries() {
        let key = entry.path_key()?;
        match head_entries.get(&key) {
            None => report.index_added.push(key),
            Some(head_entry) => {
                if head_entry.oid != entry.oid || head_entry.mode != entry.metadata.mode {
                    report.index_modified.push(key);
                }
            }
        }
    }
    for key in head_entries.keys() {
        let path = PathBuf::from(key);
        if index.entry_by_path(&path).is_none() && !index.is_conflicted(&path) {
            report.index_deleted.push(key.clone());
        }
    }

    // index vs working tree (changes not staged)
    for entry in index.tracked_entries() {
        let key = entry.path_key()?;

        if !workspace.file_exists(&entry.name) {
            report.workspace_deleted.push(key);
            continue;
        }

        let stat = workspace.stat_file(&entry.name)?;
        if entry.stat_match(&stat) && entry.times_match(&stat) {
            continue;
        }

        // stat differs; only the content hash settles it
        let content = workspace.read_file(&entry.name)?;
        let oid = Blob::new(content).object_id()?;
        if oid != entry.oid || stat.mode != entry.metadata.mode {
            report.workspace_modified.push(key);
        }
    }

    // untracked: working-tree files absent from the index at any stage
    for path in workspace.list_files(None)? {
        if !index.is_tracked(&path) && path_key(&path).is_ok() {
            let key = path_key(&path)?;
            if !report.unmerged.contains(&key) {
                report.untracked.push(key);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::index_entry::IndexEntry;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::path::Path;

    struct World {
        _temp: TempDir,
        database: Database,
        workspace: Workspace,
        index: Index,
    }

    #[fixture]
    fn world() -> World {
        let temp = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(temp.path().join(".source")).unwrap();
        World {
            database: Database::new(temp.path().join(".source/objects").into_boxed_path()),
            workspace: Workspace::new(temp.path().to_path_buf().into_boxed_path()),
            index: Index::new(temp.path().join(".source/index").into_boxed_path()),
            _temp: temp,
        }
    }

    fn stage_file(world: &mut World, path: &str, content: &str) {
        let path = Path::new(path);
        world
            .workspace
            .write_file(path, content.as_bytes(), Default::default())
            .unwrap();
        let blob = Blob::new(content.as_bytes().to_vec());
        let oid = world.database.store(&blob).unwrap();
        let stat = world.workspace.stat_file(path).unwrap();
        world
            .index
            .add(IndexEntry::new(path.to_path_buf(), oid, stat))
            .unwrap();
    }

    #[rstest]
    fn test_untracked_and_added(mut world: World) {
        stage_file(&mut world, "staged.txt", "s\n");
        world
            .workspace
            .write_file(Path::new("loose.txt"), b"l\n", Default::default())
            .unwrap();

        let report = scan(&world.database, &world.workspace, &world.index, None).unwrap();

        assert_eq!(report.index_added, vec!["staged.txt"]);
        assert_eq!(report.untracked, vec!["loose.txt"]);
    }

    #[rstest]
    fn test_workspace_modification_detected_by_content(mut world: World) {
        stage_file(&mut world, "file.txt", "before\n");
        world
            .workspace
            .write_file(Path::new("file.txt"), b"after\n", Default::default())
            .unwrap();

        let report = scan(&world.database, &world.workspace, &world.index, None).unwrap();

        assert_eq!(report.workspace_modified, vec!["file.txt"]);
    }

    #[rstest]
    fn test_workspace_deletion(mut world: World) {
        stage_file(&mut world, "file.txt", "x\n");
        world.workspace.remove_file(Path::new("file.txt")).unwrap();

        let report = scan(&world.database, &world.workspace, &world.index, None).unwrap();

        assert_eq!(report.workspace_deleted, vec!["file.txt"]);
        assert!(report.workspace_modified.is_empty());
    }

    #[rstest]
    fn test_clean_worktree_is_clean(mut world: World) {
        stage_file(&mut world, "file.txt", "x\n");
        let tree_oid = world.index.build_tree(&world.database).unwrap();

        let report = scan(
            &world.database,
            &world.workspace,
            &world.index,
            Some(&tree_oid),
        )
        .unwrap();

        assert!(report.is_clean(), "unexpected report: {:?}", report);
    }
}

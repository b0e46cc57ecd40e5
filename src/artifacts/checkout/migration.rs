//! Workspace migration
//!
//! Applies a tree-level change set to the working tree and the index,
//! turning the checked-out snapshot into the target one. Deletions run
//! first (files, then any directories left empty), then additions and
//! modifications, so a path can flip between file and directory within one
//! migration.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::diff::tree_diff::{ChangeKind, ChangeSet};
use crate::artifacts::index::index_entry::IndexEntry;
use std::path::PathBuf;

pub struct Migration<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
}

impl<'r> Migration<'r> {
    pub fn new(database: &'r Database, workspace: &'r Workspace) -> Self {
        Migration {
            database,
            workspace,
        }
    }

    /// Apply every change to the workspace and mirror it into the index.
    pub fn apply(&self, changes: &ChangeSet, index: &mut Index) -> anyhow::Result<()> {
        for (path, change) in changes {
            if let ChangeKind::Deleted(_) = change {
                let path = PathBuf::from(path);
                self.workspace.remove_file(&path)?;
                index.remove(&path)?;
            }
        }

        for (path, change) in changes {
            let entry = match change {
                ChangeKind::Added(entry) => entry,
                ChangeKind::Modified { new, .. } => new,
                ChangeKind::Deleted(_) => continue,
            };

            let path = PathBuf::from(path);
            let blob = self.database.load_blob(&entry.oid)?;
            self.workspace.write_file(&path, blob.content(), entry.mode)?;

            let stat = self.workspace.stat_file(&path)?;
            index.add(IndexEntry::new(path, entry.oid, stat))?;
        }

        Ok(())
    }
}

//! Path-scoped history filtering
//!
//! Given a commit sequence and a path, keeps each commit whose tree at that
//! path differs in digest from at least one parent's tree at the same path,
//! plus commits where the path appears or disappears. Path resolution walks
//! tree objects one component at a time; hitting a blob with components
//! still remaining means "not found".

use crate::areas::database::Database;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use tokio_util::sync::CancellationToken;

/// Resolve a `/`-separated path inside a tree to its entry.
pub fn find_in_tree(
    database: &Database,
    tree_oid: &ObjectId,
    path: &str,
) -> anyhow::Result<Option<DatabaseEntry>> {
    let path = path.trim_matches('/');
    if path.is_empty() || path == "." {
        return Ok(None);
    }

    let mut tree = database.load_tree(tree_oid)?;
    let mut components = path.split('/').peekable();

    while let Some(component) = components.next() {
        let Some(entry) = tree.get(component).copied() else {
            return Ok(None);
        };

        if components.peek().is_none() {
            return Ok(Some(entry));
        }

        // more components remain: a non-directory here is a dead end
        if !entry.is_tree() {
            return Ok(None);
        }
        tree = database.load_tree(&entry.oid)?;
    }

    Ok(None)
}

/// The digest a path resolves to in a commit's snapshot, if any.
fn blob_at_path(
    database: &Database,
    commit: &Commit,
    path: &str,
) -> anyhow::Result<Option<ObjectId>> {
    Ok(find_in_tree(database, commit.tree_oid(), path)?.map(|entry| entry.oid))
}

/// Whether a commit changed the path relative to its parents.
///
/// An initial commit counts iff the path exists in it; a merge counts when
/// any parent disagrees with the commit's own version.
pub fn commit_touches_path(
    database: &Database,
    commit: &Commit,
    path: &str,
) -> anyhow::Result<bool> {
    let current = blob_at_path(database, commit, path)?;

    if commit.is_initial() {
        return Ok(current.is_some());
    }

    for parent_oid in commit.parents() {
        let parent = database.load_commit(parent_oid)?;
        let in_parent = blob_at_path(database, &parent, path)?;

        if current != in_parent {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Retain the commits that touched a path, preserving input order.
pub fn filter_by_path(
    database: &Database,
    commits: Vec<Commit>,
    path: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<Commit>> {
    if path.is_empty() {
        return Ok(commits);
    }

    let mut filtered = Vec::with_capacity(commits.len());
    for commit in commits {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled.into());
        }

        if commit_touches_path(database, &commit, path)? {
            filtered.push(commit);
        }
    }

    Ok(filtered)
}

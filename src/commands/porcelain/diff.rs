use crate::areas::repository::Repository;
use crate::artifacts::diff::hunk::{DEFAULT_CONTEXT, FileDiff, diff_contents};
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::status_info::flatten_tree;
use bytes::Bytes;
use std::io::Write;
use std::path::Path;

/// Knobs for the `diff` operation.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Compare the index against HEAD instead of the workspace against
    /// the index
    pub cached: bool,
    /// Zero revisions (workspace/index modes) or two (tree vs tree)
    pub revisions: Vec<String>,
    /// Context lines per hunk
    pub context: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions {
            cached: false,
            revisions: Vec::new(),
            context: DEFAULT_CONTEXT,
        }
    }
}

/// One side of a file comparison.
type Side = Option<Bytes>;

impl Repository {
    /// Print unified diffs for one of the three comparison modes:
    /// workspace vs index (default), index vs HEAD (`--cached`), or tree
    /// vs tree (two revisions).
    pub async fn diff(&self, options: DiffOptions) -> anyhow::Result<()> {
        match options.revisions.len() {
            0 => {
                if options.cached {
                    self.diff_index_against_head(options.context).await
                } else {
                    self.diff_workspace_against_index(options.context).await
                }
            }
            2 => {
                let old = self.resolve_revision(&options.revisions[0])?;
                let new = self.resolve_revision(&options.revisions[1])?;
                self.diff_trees(&old, &new, options.context)
            }
            n => anyhow::bail!("diff takes zero or two revisions, got {}", n),
        }
    }

    fn diff_trees(
        &self,
        old_commit: &ObjectId,
        new_commit: &ObjectId,
        context: usize,
    ) -> anyhow::Result<()> {
        let old_tree = *self.database().load_commit(old_commit)?.tree_oid();
        let new_tree = *self.database().load_commit(new_commit)?.tree_oid();

        let mut diff = TreeDiff::new(self.database());
        diff.compare(Some(&old_tree), Some(&new_tree))?;

        for (path, change) in diff.changes() {
            let old = change
                .old_entry()
                .map(|entry| self.database().load_blob(&entry.oid))
                .transpose()?
                .map(|blob| blob.content().clone());
            let new = change
                .new_entry()
                .map(|entry| self.database().load_blob(&entry.oid))
                .transpose()?
                .map(|blob| blob.content().clone());

            self.print_file_diff(path, old, new, context)?;
        }

        Ok(())
    }

    async fn diff_index_against_head(&self, context: usize) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let head_entries = match self.head_commit()? {
            Some(commit) => flatten_tree(self.database(), commit.tree_oid())?,
            None => Default::default(),
        };

        // deletions relative to HEAD first, in path order with the rest
        let mut paths: Vec<String> = head_entries.keys().cloned().collect();
        for entry in index.tracked_entries() {
            paths.push(entry.path_key()?);
        }
        paths.sort();
        paths.dedup();

        for path in paths {
            let head_side = head_entries
                .get(&path)
                .map(|entry| self.database().load_blob(&entry.oid))
                .transpose()?
                .map(|blob| blob.content().clone());
            let index_side = index
                .entry_by_path(Path::new(&path))
                .map(|entry| self.database().load_blob(&entry.oid))
                .transpose()?
                .map(|blob| blob.content().clone());

            if head_side != index_side {
                self.print_file_diff(&path, head_side, index_side, context)?;
            }
        }

        Ok(())
    }

    async fn diff_workspace_against_index(&self, context: usize) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut rows: Vec<(String, Side, Side)> = Vec::new();
        for entry in index.tracked_entries() {
            let path = entry.path_key()?;
            let index_side = Some(self.database().load_blob(&entry.oid)?.content().clone());

            let workspace_side = if self.workspace().file_exists(&entry.name) {
                Some(self.workspace().read_file(&entry.name)?)
            } else {
                None
            };

            // skip unchanged files without printing
            if let Some(content) = &workspace_side
                && Blob::new(content.clone()).object_id()? == entry.oid
            {
                continue;
            }

            rows.push((path, index_side, workspace_side));
        }

        for (path, old, new) in rows {
            self.print_file_diff(&path, old, new, context)?;
        }

        Ok(())
    }

    fn print_file_diff(
        &self,
        path: &str,
        old: Side,
        new: Side,
        context: usize,
    ) -> anyhow::Result<()> {
        let old_bytes = old.as_deref().unwrap_or(&[]);
        let new_bytes = new.as_deref().unwrap_or(&[]);

        let result = diff_contents(old_bytes, new_bytes, context);
        if result.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer();
        writeln!(writer, "diff --source a/{} b/{}", path, path)?;

        match result {
            FileDiff::Binary => {
                writeln!(writer, "Binary files a/{} and b/{} differ", path, path)?;
            }
            FileDiff::Text(hunks) => {
                let old_label = if old.is_some() {
                    format!("a/{}", path)
                } else {
                    "/dev/null".to_string()
                };
                let new_label = if new.is_some() {
                    format!("b/{}", path)
                } else {
                    "/dev/null".to_string()
                };
                writeln!(writer, "--- {}", old_label)?;
                writeln!(writer, "+++ {}", new_label)?;

                for hunk in hunks {
                    writeln!(writer, "{}", hunk.format())?;
                }
            }
        }

        Ok(())
    }
}

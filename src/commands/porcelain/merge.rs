//! Merging
//!
//! Dispatch order: already-up-to-date, fast-forward (HEAD simply advances,
//! no commit), then a true three-way merge against the best common
//! ancestor. A clean three-way merge commits with parents
//! `[HEAD, MERGE_HEAD]`; a squash merge commits the same tree with HEAD as
//! the only parent. Conflicts materialize markers in the workspace and
//! stages 1–3 in the index, record the merge state files, and surface
//! `MergeConflict`.

use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::merge::diff3::merge_contents;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::merge::threeway::{
    Conflict, MergeResult, ResolutionStrategy, ThreeWayMerger,
};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Knobs for the `merge` operation.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Commit message; a default is composed when absent
    pub message: Option<String>,
    /// Produce a one-parent commit instead of a merge commit
    pub squash: bool,
    /// Refuse anything but a fast-forward
    pub ff_only: bool,
    /// How blob-level conflicts are settled
    pub strategy: ResolutionStrategy,
    /// Include the base section in conflict markers
    pub diff3: bool,
    /// Label for the ours side of conflict markers ("ours" when absent)
    pub ours_label: Option<String>,
    /// Label for the theirs side of conflict markers ("theirs" when absent)
    pub theirs_label: Option<String>,
}

impl Repository {
    /// Merge another revision into HEAD.
    pub async fn merge(&self, target: &str, options: MergeOptions) -> anyhow::Result<()> {
        if self.merge_state().in_progress() {
            anyhow::bail!("a merge is already in progress (resolve and commit, or abort)");
        }

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| anyhow::anyhow!("cannot merge into an unborn HEAD"))?;
        let their_oid = self.resolve_revision(target)?;

        let cancel = CancellationToken::new();
        let finder = MergeBaseFinder::new(self.database());

        if finder.is_ancestor(&their_oid, &head_oid, &cancel)? {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(());
        }

        if finder.can_fast_forward(&head_oid, &their_oid, &cancel)? && !options.squash {
            return self.fast_forward(&head_oid, &their_oid).await;
        }

        if options.ff_only {
            return Err(SourceError::NotFastForward {
                from: head_oid.to_hex(),
                to: their_oid.to_hex(),
            }
            .into());
        }

        let base_oid = finder.find_best(&head_oid, &their_oid, &cancel)?;
        self.three_way(&head_oid, &their_oid, base_oid, target, options, &cancel)
            .await
    }

    /// Abort an in-progress merge: restore ORIG_HEAD's snapshot and clear
    /// the state files.
    pub async fn merge_abort(&self) -> anyhow::Result<()> {
        if !self.merge_state().in_progress() {
            anyhow::bail!("no merge in progress");
        }

        let orig_head = self.merge_state().orig_head()?;
        let orig_tree = *self.database().load_commit(&orig_head)?.tree_oid();

        {
            let index = self.index();
            let mut index = index.lock().await;
            index.load_tree(self.database(), &orig_tree)?;
            index.write_updates()?;
        }
        self.restore_conflicted_workspace(&orig_tree).await?;

        self.merge_state().clear()?;
        writeln!(self.writer(), "Merge aborted")?;
        Ok(())
    }

    async fn restore_conflicted_workspace(&self, tree_oid: &ObjectId) -> anyhow::Result<()> {
        // rewrite every tracked file from the tree; conflicted files carry
        // markers the tree diff cannot see
        let entries = crate::artifacts::status::status_info::flatten_tree(
            self.database(),
            tree_oid,
        )?;
        for (path, entry) in entries {
            let blob = self.database().load_blob(&entry.oid)?;
            self.workspace()
                .write_file(Path::new(&path), blob.content(), entry.mode)?;
        }
        Ok(())
    }

    async fn fast_forward(&self, head_oid: &ObjectId, their_oid: &ObjectId) -> anyhow::Result<()> {
        let head_tree = *self.database().load_commit(head_oid)?.tree_oid();
        let their_tree = *self.database().load_commit(their_oid)?.tree_oid();

        self.migrate_to_tree(Some(&head_tree), &their_tree).await?;
        self.refs().update_head(*their_oid)?;

        writeln!(
            self.writer(),
            "Fast-forward {}..{}",
            head_oid.to_short(),
            their_oid.to_short()
        )?;
        Ok(())
    }

    async fn three_way(
        &self,
        head_oid: &ObjectId,
        their_oid: &ObjectId,
        base_oid: Option<ObjectId>,
        target: &str,
        options: MergeOptions,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let head_tree = *self.database().load_commit(head_oid)?.tree_oid();
        let their_tree = *self.database().load_commit(their_oid)?.tree_oid();
        let base_tree = match &base_oid {
            Some(oid) => Some(*self.database().load_commit(oid)?.tree_oid()),
            None => None,
        };

        let merger = ThreeWayMerger::new(self.database());
        let mut result = merger.merge_trees(
            base_tree.as_ref(),
            Some(&head_tree),
            Some(&their_tree),
            cancel,
        )?;

        let message = options.message.clone().unwrap_or_else(|| {
            format!("Merge '{}' into {}", target, self.current_branch_label())
        });

        if !result.is_clean() && options.strategy != ResolutionStrategy::Fail {
            self.apply_strategy(&mut result, options.strategy)?;
        }

        if result.is_clean() {
            return self
                .conclude_merge(head_oid, their_oid, &result, &message, &options)
                .await;
        }

        self.materialize_conflicts(head_oid, their_oid, &result, &message, &options)
            .await
    }

    /// Settle every conflict by strategy, leaving the result clean.
    fn apply_strategy(
        &self,
        result: &mut MergeResult,
        strategy: ResolutionStrategy,
    ) -> anyhow::Result<()> {
        for conflict in std::mem::take(&mut result.conflicts) {
            let chosen: Option<DatabaseEntry> = match strategy {
                ResolutionStrategy::Fail => unreachable!("fail strategy never resolves"),
                ResolutionStrategy::Ours => conflict.ours,
                ResolutionStrategy::Theirs => conflict.theirs,
                ResolutionStrategy::Union => self.union_entry(&conflict)?,
            };

            match chosen {
                Some(entry) => {
                    result.entries.insert(conflict.path.clone(), entry);
                }
                None => {
                    result.entries.remove(&conflict.path);
                }
            }
        }
        Ok(())
    }

    /// Concatenate ours then theirs into a fresh blob; with one side
    /// absent, the present side wins.
    fn union_entry(&self, conflict: &Conflict) -> anyhow::Result<Option<DatabaseEntry>> {
        let (Some(ours), Some(theirs)) = (conflict.ours, conflict.theirs) else {
            return Ok(conflict.ours.or(conflict.theirs));
        };

        let ours_content = self.database().load_blob(&ours.oid)?;
        let theirs_content = self.database().load_blob(&theirs.oid)?;

        let mut combined = ours_content.content().to_vec();
        if !combined.is_empty() && !combined.ends_with(b"\n") {
            combined.push(b'\n');
        }
        combined.extend_from_slice(theirs_content.content());

        let oid = self.database().store(&Blob::new(combined))?;
        Ok(Some(DatabaseEntry::new(oid, ours.mode)))
    }

    async fn conclude_merge(
        &self,
        head_oid: &ObjectId,
        their_oid: &ObjectId,
        result: &MergeResult,
        message: &str,
        options: &MergeOptions,
    ) -> anyhow::Result<()> {
        let merger = ThreeWayMerger::new(self.database());
        let merged_tree = merger.write_tree(&result.entries)?;

        let head_tree = *self.database().load_commit(head_oid)?.tree_oid();
        self.migrate_to_tree(Some(&head_tree), &merged_tree).await?;

        let parents = if options.squash {
            vec![*head_oid]
        } else {
            vec![*head_oid, *their_oid]
        };

        let author = self.author()?;
        let commit = Commit::try_new_authored(parents, merged_tree, author, message.to_string())?;
        let commit_oid = self.database().store(&commit)?;

        let target_ref = self.refs().current_ref(None)?;
        self.refs()
            .update(&target_ref, commit_oid, Some(head_oid))?;

        let kind = if options.squash { "Squash merge" } else { "Merge" };
        writeln!(
            self.writer(),
            "{} made commit {}",
            kind,
            commit_oid.to_short()
        )?;
        Ok(())
    }

    /// Write markers and stages for every conflict, persist the merge
    /// state, and fail with the conflicted path set.
    async fn materialize_conflicts(
        &self,
        head_oid: &ObjectId,
        their_oid: &ObjectId,
        result: &MergeResult,
        message: &str,
        options: &MergeOptions,
    ) -> anyhow::Result<()> {
        let paths = self.write_conflict_artifacts(head_oid, result, options).await?;

        self.merge_state().save(
            their_oid,
            message,
            head_oid,
            if options.squash { "squash" } else { "" },
        )?;

        let mut writer = self.writer();
        for path in &paths {
            writeln!(writer, "CONFLICT: merge conflict in {}", path)?;
        }
        writeln!(
            writer,
            "Automatic merge failed; fix conflicts and then commit the result."
        )?;
        drop(writer);

        Err(SourceError::MergeConflict { paths }.into())
    }

    /// Materialize a conflicted three-way outcome: migrate the auto-merged
    /// portion, write marker files, and install index stages 1–3. Returns
    /// the conflicted paths. Shared by merge and revert.
    pub(crate) async fn write_conflict_artifacts(
        &self,
        head_oid: &ObjectId,
        result: &MergeResult,
        options: &MergeOptions,
    ) -> anyhow::Result<Vec<String>> {
        let head_tree = *self.database().load_commit(head_oid)?.tree_oid();

        // bring the auto-merged portion into the workspace and index first
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let merger = ThreeWayMerger::new(self.database());
        let merged_tree = merger.write_tree(&result.entries)?;

        let mut diff = TreeDiff::new(self.database());
        diff.compare(Some(&head_tree), Some(&merged_tree))?;
        Migration::new(self.database(), self.workspace()).apply(diff.changes(), &mut index)?;

        let ours_label = options.ours_label.as_deref().unwrap_or("ours");
        let theirs_label = options.theirs_label.as_deref().unwrap_or("theirs");

        for conflict in &result.conflicts {
            let path = PathBuf::from(&conflict.path);

            if let (Some(ours), Some(theirs)) = (conflict.ours, conflict.theirs)
                && !ours.mode.is_tree()
                && !theirs.mode.is_tree()
            {
                let base_content = match conflict.base {
                    Some(base) => self.database().load_blob(&base.oid)?.content().to_vec(),
                    None => Vec::new(),
                };
                let ours_content = self.database().load_blob(&ours.oid)?;
                let theirs_content = self.database().load_blob(&theirs.oid)?;

                // line-level merge: context stays outside the markers
                let merged = merge_contents(
                    &base_content,
                    ours_content.content(),
                    theirs_content.content(),
                    ours_label,
                    theirs_label,
                    options.diff3,
                );
                self.workspace()
                    .write_file(&path, &merged.content, ours.mode)?;
            }

            index.add_conflict(&path, conflict.base, conflict.ours, conflict.theirs)?;
        }

        index.write_updates()?;
        Ok(result.conflicted_paths())
    }

    fn current_branch_label(&self) -> String {
        self.refs()
            .current_ref(None)
            .map(|r| r.short_name().to_string())
            .unwrap_or_else(|_| "HEAD".to_string())
    }
}

//! Reverting a commit
//!
//! Reverting applies the inverse of a commit onto HEAD: a three-way merge
//! with the reverted commit's tree as the base, HEAD as ours, and the
//! reverted commit's parent tree as theirs. The resulting snapshot is
//! checked out recursively and recorded as a new one-parent commit.

use crate::areas::repository::Repository;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::merge::threeway::{ResolutionStrategy, ThreeWayMerger};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::commands::porcelain::merge::MergeOptions;
use std::io::Write;
use tokio_util::sync::CancellationToken;

impl Repository {
    /// Create a commit undoing the changes a prior commit introduced.
    pub async fn revert(&self, target: &str) -> anyhow::Result<ObjectId> {
        let target_oid = self.resolve_revision(target)?;
        let target_commit = self.database().load_commit(&target_oid)?;

        if target_commit.is_merge() {
            return Err(SourceError::CannotRevertMerge {
                oid: target_oid.to_hex(),
            }
            .into());
        }
        let parent_oid = target_commit.first_parent().copied().ok_or_else(|| {
            SourceError::CannotRevertInitial {
                oid: target_oid.to_hex(),
            }
        })?;

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| anyhow::anyhow!("cannot revert onto an unborn HEAD"))?;

        let head_tree = *self.database().load_commit(&head_oid)?.tree_oid();
        let parent_tree = *self.database().load_commit(&parent_oid)?.tree_oid();
        let reverted_tree = *target_commit.tree_oid();

        // inverse application: base = the commit being undone, ours = HEAD,
        // theirs = the state before that commit
        let cancel = CancellationToken::new();
        let merger = ThreeWayMerger::new(self.database());
        let result = merger.merge_trees(
            Some(&reverted_tree),
            Some(&head_tree),
            Some(&parent_tree),
            &cancel,
        )?;

        let message = format!(
            "Revert \"{}\"\n\nThis reverts commit {}.",
            target_commit.short_message(),
            target_oid
        );

        if !result.is_clean() {
            // reuse the merge materialization path so stages and markers
            // land exactly as a conflicted merge would leave them
            let options = MergeOptions {
                message: Some(message),
                strategy: ResolutionStrategy::Fail,
                ..Default::default()
            };
            let paths = self
                .write_conflict_artifacts(&head_oid, &result, &options)
                .await?;
            return Err(SourceError::MergeConflict { paths }.into());
        }

        let merged_tree = merger.write_tree(&result.entries)?;
        self.migrate_to_tree(Some(&head_tree), &merged_tree).await?;

        let author = self.author()?;
        let commit =
            Commit::try_new_authored(vec![head_oid], merged_tree, author, message)?;
        let commit_oid = self.database().store(&commit)?;

        let target_ref = self.refs().current_ref(None)?;
        self.refs()
            .update(&target_ref, commit_oid, Some(&head_oid))?;

        writeln!(
            self.writer(),
            "[{} {}] {}",
            target_ref.short_name(),
            commit_oid.to_short(),
            commit.short_message()
        )?;

        Ok(commit_oid)
    }
}

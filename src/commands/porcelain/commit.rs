use crate::areas::repository::Repository;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Record the index as a commit and advance the current ref.
    ///
    /// A pending merge contributes MERGE_HEAD as the second parent and is
    /// concluded (state cleared) by the commit. Preconditions:
    /// `EmptyCommitMessage` when no message is available, `MergeConflict`
    /// while conflict stages remain, `NothingToCommit` when the snapshot
    /// equals HEAD's and no merge is pending.
    pub async fn commit(&self, message: &str) -> anyhow::Result<ObjectId> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if index.has_conflicts() {
            let paths = index
                .conflicts()
                .into_iter()
                .map(|conflict| conflict.path)
                .collect();
            return Err(SourceError::MergeConflict { paths }.into());
        }

        let pending_merge = self.merge_state().in_progress();

        let mut message = message.trim().to_string();
        if message.is_empty() && pending_merge {
            message = self.merge_state().message()?.trim().to_string();
        }
        if message.is_empty() {
            return Err(SourceError::EmptyCommitMessage.into());
        }

        let tree_oid = index.build_tree(self.database())?;

        let head_oid = self.refs().read_head()?;
        let mut parents: Vec<ObjectId> = head_oid.into_iter().collect();

        if pending_merge {
            parents.push(self.merge_state().merge_head()?);
        } else {
            let unchanged = match &head_oid {
                Some(oid) => *self.database().load_commit(oid)?.tree_oid() == tree_oid,
                None => index.tracked_entries().next().is_none(),
            };
            if unchanged {
                return Err(SourceError::NothingToCommit.into());
            }
        }

        let author = self.author()?;
        let commit = Commit::try_new_authored(parents, tree_oid, author, message)?;
        let commit_oid = self.database().store(&commit)?;

        // compare-and-set against the head we built the commit on
        let target = self.refs().current_ref(None)?;
        self.refs()
            .update(&target, commit_oid, head_oid.as_ref())?;

        if pending_merge {
            self.merge_state().clear()?;
        }

        let root_marker = if commit.is_initial() {
            "(root-commit) "
        } else {
            ""
        };
        writeln!(
            self.writer(),
            "[{} {}{}] {}",
            target.short_name(),
            root_marker,
            commit_oid.to_short(),
            commit.short_message()
        )?;

        Ok(commit_oid)
    }
}

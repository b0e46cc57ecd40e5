use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::TreeDiff;
use std::io::Write;

/// What `reset` touches beyond the current ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Move the ref only
    Soft,
    /// Also repopulate the index from the target tree
    #[default]
    Mixed,
    /// Also materialize the target tree into the workspace
    Hard,
}

impl Repository {
    /// Move the current ref to a commit, optionally resetting the index
    /// and workspace to match.
    pub async fn reset(&self, target: Option<&str>, mode: ResetMode) -> anyhow::Result<()> {
        let target_oid = match target {
            Some(revision) => self.resolve_revision(revision)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| anyhow::anyhow!("cannot reset an unborn HEAD"))?,
        };
        let target_tree = *self.database().load_commit(&target_oid)?.tree_oid();
        let old_tree = self.head_commit()?.map(|commit| *commit.tree_oid());

        self.refs().update_head(target_oid)?;

        if mode != ResetMode::Soft {
            let index = self.index();
            let mut index = index.lock().await;
            index.load_tree(self.database(), &target_tree)?;

            if mode == ResetMode::Hard {
                let mut diff = TreeDiff::new(self.database());
                diff.compare(old_tree.as_ref(), Some(&target_tree))?;
                Migration::new(self.database(), self.workspace())
                    .apply(diff.changes(), &mut index)?;
            }

            index.write_updates()?;
        }

        writeln!(
            self.writer(),
            "HEAD is now at {}",
            target_oid.to_short()
        )?;
        Ok(())
    }
}

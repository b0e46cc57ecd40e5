use crate::areas::repository::Repository;
use crate::artifacts::branch::ref_name::RefName;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Materialize a commit's tree into the workspace and index, then move
    /// HEAD: symbolically for a branch name, detached otherwise.
    pub async fn checkout(&self, target: &str) -> anyhow::Result<()> {
        let branch = RefName::branch(target).ok();
        let branch_oid = match &branch {
            Some(branch) => self.refs().resolve_optional(branch)?,
            None => None,
        };

        let (target_oid, new_branch) = match branch_oid {
            Some(oid) => (oid, branch),
            None => (self.resolve_revision(target)?, None),
        };

        let target_tree = *self.database().load_commit(&target_oid)?.tree_oid();
        let current_tree = self.head_commit()?.map(|commit| *commit.tree_oid());

        self.migrate_to_tree(current_tree.as_ref(), &target_tree)
            .await?;

        match &new_branch {
            Some(branch) => {
                self.refs().set_head_branch(branch)?;
                writeln!(self.writer(), "Switched to branch '{}'", target)?;
            }
            None => {
                self.refs().set_head_detached(target_oid)?;
                writeln!(
                    self.writer(),
                    "HEAD is now detached at {}",
                    target_oid.to_short()
                )?;
            }
        }

        Ok(())
    }

    /// Apply the tree-level difference between two snapshots to the
    /// workspace and the index.
    pub(crate) async fn migrate_to_tree(
        &self,
        from_tree: Option<&ObjectId>,
        to_tree: &ObjectId,
    ) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut diff = TreeDiff::new(self.database());
        diff.compare(from_tree, Some(to_tree))?;

        Migration::new(self.database(), self.workspace()).apply(diff.changes(), &mut index)?;
        index.write_updates()
    }
}

use crate::areas::repository::Repository;
use crate::artifacts::branch::ref_name::RefName;
use std::io::Write;

impl Repository {
    /// Create a branch at HEAD or at the given revision.
    pub fn branch_create(&self, name: &str, start: Option<&str>) -> anyhow::Result<()> {
        let branch = RefName::branch(name)?;

        let oid = match start {
            Some(revision) => self.resolve_revision(revision)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| anyhow::anyhow!("cannot branch from an unborn HEAD"))?,
        };

        if self.refs().resolve_optional(&branch)?.is_some() {
            anyhow::bail!("branch '{}' already exists", name);
        }

        self.refs().update(&branch, oid, None)
    }

    /// List branches, marking the checked-out one.
    pub fn branch_list(&self) -> anyhow::Result<Vec<String>> {
        let current = self.refs().current_ref(None)?;
        let branches = self.refs().list("refs/heads/")?;

        let mut writer = self.writer();
        let mut names = Vec::new();
        for branch in branches {
            let marker = if branch == current { "* " } else { "  " };
            writeln!(writer, "{}{}", marker, branch.short_name())?;
            names.push(branch.short_name().to_string());
        }

        Ok(names)
    }

    /// Delete a branch; the checked-out branch is protected.
    pub fn branch_delete(&self, name: &str) -> anyhow::Result<()> {
        let branch = RefName::branch(name)?;

        if self.refs().current_ref(None)? == branch {
            anyhow::bail!("cannot delete the checked-out branch '{}'", name);
        }

        let oid = self.refs().delete(&branch)?;
        writeln!(
            self.writer(),
            "Deleted branch {} (was {})",
            name,
            oid.to_short()
        )?;

        Ok(())
    }
}

use crate::areas::repository::Repository;
use crate::artifacts::objects::object::ObjectBox;
use std::io::Write;

impl Repository {
    /// Pretty-print an object named by a revision expression or an
    /// (abbreviated) digest.
    pub fn show(&self, revspec: &str) -> anyhow::Result<()> {
        let oid = self.resolve_revision(revspec)?;
        let object = self.database().load(&oid)?;

        let mut writer = self.writer();
        match &object {
            ObjectBox::Commit(commit) => {
                writeln!(writer, "commit {}", oid)?;
                writeln!(writer, "Author: {}", commit.author().display_name())?;
                writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
                writeln!(writer)?;
                for line in commit.message().lines() {
                    writeln!(writer, "    {}", line)?;
                }
            }
            other => {
                writeln!(writer, "{}", other.display())?;
            }
        }

        Ok(())
    }
}

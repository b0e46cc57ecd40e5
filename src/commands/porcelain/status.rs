use crate::areas::repository::Repository;
use crate::artifacts::status::status_info::{StatusReport, scan};
use std::io::Write;

impl Repository {
    /// Classify and print the working-tree status.
    pub async fn status(&self) -> anyhow::Result<StatusReport> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let head_tree = self.head_commit()?.map(|commit| *commit.tree_oid());
        let report = scan(
            self.database(),
            self.workspace(),
            &index,
            head_tree.as_ref(),
        )?;

        self.print_report(&report)?;
        Ok(report)
    }

    fn print_report(&self, report: &StatusReport) -> anyhow::Result<()> {
        let mut writer = self.writer();

        let current = self.refs().current_ref(None)?;
        if self.refs().is_head_detached()? {
            let head = self.refs().read_head()?.expect("detached HEAD has a digest");
            writeln!(writer, "HEAD detached at {}", head.to_short())?;
        } else {
            writeln!(writer, "On branch {}", current.short_name())?;
        }

        if !report.unmerged.is_empty() {
            writeln!(writer, "\nUnmerged paths:")?;
            for path in &report.unmerged {
                writeln!(writer, "\tboth modified:   {}", path)?;
            }
        }

        let staged = report
            .index_added
            .iter()
            .map(|p| ("new file", p))
            .chain(report.index_modified.iter().map(|p| ("modified", p)))
            .chain(report.index_deleted.iter().map(|p| ("deleted", p)))
            .collect::<Vec<_>>();
        if !staged.is_empty() {
            writeln!(writer, "\nChanges to be committed:")?;
            for (label, path) in staged {
                writeln!(writer, "\t{}:   {}", label, path)?;
            }
        }

        let unstaged = report
            .workspace_modified
            .iter()
            .map(|p| ("modified", p))
            .chain(report.workspace_deleted.iter().map(|p| ("deleted", p)))
            .collect::<Vec<_>>();
        if !unstaged.is_empty() {
            writeln!(writer, "\nChanges not staged for commit:")?;
            for (label, path) in unstaged {
                writeln!(writer, "\t{}:   {}", label, path)?;
            }
        }

        if !report.untracked.is_empty() {
            writeln!(writer, "\nUntracked files:")?;
            for path in &report.untracked {
                writeln!(writer, "\t{}", path)?;
            }
        }

        if report.is_clean() {
            writeln!(writer, "nothing to commit, working tree clean")?;
        }

        Ok(())
    }
}

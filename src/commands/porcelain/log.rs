use crate::areas::repository::Repository;
use crate::artifacts::log::file_history::filter_by_path;
use crate::artifacts::log::rev_list::{RevList, WalkOptions};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::Object;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Knobs for the `log` operation.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Starting revision (HEAD when absent)
    pub revision: Option<String>,
    /// Emit at most this many commits
    pub limit: Option<usize>,
    /// Follow only first parents
    pub first_parent: bool,
    /// Keep only commits touching this path
    pub path: Option<String>,
}

impl Repository {
    /// Walk and print history in reverse chronological order.
    pub async fn log(&self, options: LogOptions) -> anyhow::Result<Vec<Commit>> {
        let start = match &options.revision {
            Some(revision) => self.resolve_revision(revision)?,
            None => match self.refs().read_head()? {
                Some(oid) => oid,
                None => return Ok(Vec::new()),
            },
        };

        let cancel = CancellationToken::new();
        let walk = RevList::new(
            self.database(),
            start,
            WalkOptions {
                // with a path filter the bound applies after filtering
                limit: options.path.is_none().then_some(options.limit).flatten(),
                first_parent: options.first_parent,
            },
            cancel.clone(),
        )?;

        let mut commits = walk.collect::<anyhow::Result<Vec<Commit>>>()?;

        if let Some(path) = &options.path {
            commits = filter_by_path(self.database(), commits, path, &cancel)?;
            if let Some(limit) = options.limit {
                commits.truncate(limit);
            }
        }

        let mut writer = self.writer();
        for commit in &commits {
            writeln!(writer, "commit {}", commit.object_id()?)?;
            writeln!(writer, "Author: {}", commit.author().display_name())?;
            writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
            writeln!(writer)?;
            for line in commit.message().lines() {
                writeln!(writer, "    {}", line)?;
            }
            writeln!(writer)?;
        }

        Ok(commits)
    }
}

//! In-progress merge state
//!
//! While a merge is unresolved, four files under the repository directory
//! record it: `MERGE_HEAD` (the commit being merged), `MERGE_MSG` (the
//! prepared message), `ORIG_HEAD` (HEAD before the merge began), and
//! `MERGE_MODE`. They exist iff a merge is in progress and are removed
//! together when the merge concludes or aborts.

use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::path::Path;

const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MSG: &str = "MERGE_MSG";
const ORIG_HEAD: &str = "ORIG_HEAD";
const MERGE_MODE: &str = "MERGE_MODE";

/// Manager for the merge state files.
#[derive(Debug)]
pub struct MergeState {
    /// Repository directory (typically `.source`)
    path: Box<Path>,
}

impl MergeState {
    pub fn new(path: Box<Path>) -> Self {
        MergeState { path }
    }

    pub fn in_progress(&self) -> bool {
        self.path.join(MERGE_HEAD).exists()
    }

    /// Record a just-started merge.
    pub fn save(
        &self,
        merge_head: &ObjectId,
        message: &str,
        orig_head: &ObjectId,
        mode: &str,
    ) -> anyhow::Result<()> {
        self.write(MERGE_HEAD, &format!("{}\n", merge_head))?;
        self.write(MERGE_MSG, message)?;
        self.write(ORIG_HEAD, &format!("{}\n", orig_head))?;
        self.write(MERGE_MODE, mode)?;
        Ok(())
    }

    pub fn merge_head(&self) -> anyhow::Result<ObjectId> {
        let content = self.read(MERGE_HEAD)?;
        ObjectId::try_parse(content.trim())
    }

    pub fn message(&self) -> anyhow::Result<String> {
        self.read(MERGE_MSG)
    }

    pub fn orig_head(&self) -> anyhow::Result<ObjectId> {
        let content = self.read(ORIG_HEAD)?;
        ObjectId::try_parse(content.trim())
    }

    pub fn mode(&self) -> anyhow::Result<String> {
        if !self.path.join(MERGE_MODE).exists() {
            return Ok(String::new());
        }
        Ok(self.read(MERGE_MODE)?.trim().to_string())
    }

    /// Remove every state file; missing files are fine.
    pub fn clear(&self) -> anyhow::Result<()> {
        for file in [MERGE_HEAD, MERGE_MSG, ORIG_HEAD, MERGE_MODE] {
            let path = self.path.join(file);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(anyhow::Error::from(err)
                        .context(format!("unable to remove {}", path.display())));
                }
            }
        }
        Ok(())
    }

    fn write(&self, file: &str, content: &str) -> anyhow::Result<()> {
        let path = self.path.join(file);
        std::fs::write(&path, content)
            .with_context(|| format!("unable to write {}", path.display()))
    }

    fn read(&self, file: &str) -> anyhow::Result<String> {
        let path = self.path.join(file);
        std::fs::read_to_string(&path)
            .with_context(|| format!("unable to read {}", path.display()))
    }
}

use crate::areas::repository::Repository;
use crate::artifacts::branch::ref_name::RefName;
use std::io::Write;

/// Default branch a fresh repository points HEAD at
pub const DEFAULT_BRANCH: &str = "master";

impl Repository {
    /// Create the repository directory skeleton.
    ///
    /// Idempotent: re-running on an existing repository recreates nothing
    /// and leaves HEAD alone.
    pub async fn init(&self) -> anyhow::Result<()> {
        let source = self.source_path();

        std::fs::create_dir_all(source.join("objects"))?;
        std::fs::create_dir_all(source.join("refs").join("heads"))?;
        std::fs::create_dir_all(source.join("refs").join("tags"))?;

        if !source.join("HEAD").exists() {
            self.refs()
                .set_head_branch(&RefName::branch(DEFAULT_BRANCH)?)?;
        }

        if !source.join("config").exists() {
            std::fs::write(source.join("config"), "")?;
        }

        writeln!(
            self.writer(),
            "Initialized empty repository in {}",
            source.display()
        )?;

        Ok(())
    }
}

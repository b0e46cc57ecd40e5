use crate::areas::repository::Repository;
use crate::artifacts::branch::ref_name::RefName;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use std::io::Write;

impl Repository {
    /// Create a tag at HEAD or at a revision.
    ///
    /// With a message, an annotated tag object is stored and the ref
    /// points at it; otherwise the ref points straight at the commit.
    /// Signing is not supported.
    pub fn tag_create(
        &self,
        name: &str,
        revision: Option<&str>,
        message: Option<&str>,
    ) -> anyhow::Result<()> {
        let tag_ref = RefName::tag(name)?;

        if self.refs().resolve_optional(&tag_ref)?.is_some() {
            anyhow::bail!("tag '{}' already exists", name);
        }

        let target_oid = match revision {
            Some(revision) => self.resolve_revision(revision)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| anyhow::anyhow!("cannot tag an unborn HEAD"))?,
        };

        let ref_target = match message {
            Some(message) => {
                let tagger = self.author()?;
                let tag = Tag::new(
                    target_oid,
                    ObjectType::Commit,
                    name.to_string(),
                    tagger,
                    message.trim().to_string(),
                );
                self.database().store(&tag)?
            }
            None => target_oid,
        };

        self.refs().update(&tag_ref, ref_target, None)
    }

    /// List tag short names in order.
    pub fn tag_list(&self) -> anyhow::Result<Vec<String>> {
        let tags = self.refs().list("refs/tags/")?;

        let mut writer = self.writer();
        let mut names = Vec::new();
        for tag in tags {
            writeln!(writer, "{}", tag.short_name())?;
            names.push(tag.short_name().to_string());
        }

        Ok(names)
    }

    pub fn tag_delete(&self, name: &str) -> anyhow::Result<()> {
        let tag_ref = RefName::tag(name)?;
        let oid = self.refs().delete(&tag_ref)?;

        writeln!(
            self.writer(),
            "Deleted tag {} (was {})",
            name,
            oid.to_short()
        )?;
        Ok(())
    }
}

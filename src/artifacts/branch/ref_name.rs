//! Reference names
//!
//! A `RefName` is the full path of a reference relative to the repository
//! directory: `HEAD`, `refs/heads/<branch>`, `refs/tags/<tag>`. Names are
//! validated on construction; everything downstream can trust them.

use crate::artifacts::core::error::SourceError;
use std::path::Path;

/// Prefix for branch references
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Prefix for tag references
pub const TAGS_PREFIX: &str = "refs/tags/";

/// Name of the distinguished entry-point reference
pub const HEAD: &str = "HEAD";

/// Validated reference name (full path form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    pub fn head() -> Self {
        RefName(HEAD.to_string())
    }

    /// `refs/heads/<name>` for a short branch name.
    pub fn branch(name: &str) -> anyhow::Result<Self> {
        Self::try_parse(&format!("{}{}", HEADS_PREFIX, name))
    }

    /// `refs/tags/<name>` for a short tag name.
    pub fn tag(name: &str) -> anyhow::Result<Self> {
        Self::try_parse(&format!("{}{}", TAGS_PREFIX, name))
    }

    /// Validate a full reference path.
    pub fn try_parse(name: &str) -> anyhow::Result<Self> {
        if name == HEAD {
            return Ok(RefName(name.to_string()));
        }

        if name.is_empty()
            || name.starts_with('/')
            || name.ends_with('/')
            || name.contains("//")
        {
            return Err(invalid(name));
        }

        for component in name.split('/') {
            validate_component(component).map_err(|_| invalid(name))?;
        }

        Ok(RefName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative filesystem path under the repository directory.
    pub fn as_ref_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// The human-facing short form: strips `refs/heads/` or `refs/tags/`.
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix(HEADS_PREFIX)
            .or_else(|| self.0.strip_prefix(TAGS_PREFIX))
            .unwrap_or(&self.0)
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }
}

fn invalid(name: &str) -> anyhow::Error {
    SourceError::InvalidRefName {
        name: name.to_string(),
    }
    .into()
}

fn validate_component(component: &str) -> anyhow::Result<()> {
    if component.is_empty()
        || component.starts_with('.')
        || component.starts_with('-')
        || component.ends_with('.')
        || component.ends_with(".lock")
        || component.contains("..")
        || component.contains("@{")
    {
        anyhow::bail!("invalid ref component");
    }

    for c in component.chars() {
        if c.is_whitespace()
            || c.is_control()
            || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')
        {
            anyhow::bail!("invalid ref character");
        }
    }

    Ok(())
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

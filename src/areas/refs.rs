//! Reference store
//!
//! References are human-readable names pointing into the object graph. A
//! reference file holds either a 40-hex digest plus newline (direct) or a
//! `ref: <target>` line (symbolic). `HEAD` is the distinguished entry
//! point; branches live under `refs/heads/`, tags under `refs/tags/`.
//!
//! Updates are atomic via write-temp-then-rename and use compare-and-set on
//! a known old value to detect lost updates; no in-process lock is assumed
//! across processes. Symbolic chains resolve to a depth of at most five
//! before being reported as cycles.

use crate::artifacts::branch::ref_name::{HEAD, RefName};
use crate::artifacts::core::error::SourceError;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::io::Write;
use std::path::Path;

/// Maximum symbolic indirections followed before reporting a cycle
const MAX_SYMREF_DEPTH: usize = 5;

/// Regex pattern for symbolic reference contents
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Raw contents of a reference file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Direct digest
    Direct(ObjectId),
    /// Symbolic pointer to another reference
    Symbolic(RefName),
}

/// Reference manager rooted at the repository directory.
#[derive(Debug)]
pub struct Refs {
    /// Path to the repository directory (typically `.source`)
    path: Box<Path>,
}

impl Refs {
    pub fn new(path: Box<Path>) -> Self {
        Refs { path }
    }

    /// Read a reference file without following indirection.
    pub fn read_raw(&self, name: &RefName) -> anyhow::Result<Option<RefValue>> {
        let ref_path = self.path.join(name.as_ref_path());
        if !ref_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&ref_path)
            .with_context(|| format!("unable to read ref file {}", ref_path.display()))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref) = symref {
            Ok(Some(RefValue::Symbolic(RefName::try_parse(&symref[1])?)))
        } else {
            Ok(Some(RefValue::Direct(ObjectId::try_parse(content)?)))
        }
    }

    /// Resolve a name to a digest, following symbolic chains.
    ///
    /// Fails with `RefNotFound` when the chain dead-ends and `RefCycle`
    /// when it exceeds the depth limit.
    pub fn resolve(&self, name: &RefName) -> anyhow::Result<ObjectId> {
        self.resolve_optional(name)?.ok_or_else(|| {
            SourceError::RefNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Like `resolve`, but an unborn reference (missing file anywhere in
    /// the chain) is `None` rather than an error.
    pub fn resolve_optional(&self, name: &RefName) -> anyhow::Result<Option<ObjectId>> {
        let mut current = name.clone();

        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read_raw(&current)? {
                Some(RefValue::Direct(oid)) => return Ok(Some(oid)),
                Some(RefValue::Symbolic(target)) => current = target,
                None => return Ok(None),
            }
        }

        Err(SourceError::RefCycle {
            name: name.to_string(),
        }
        .into())
    }

    /// The final reference a symbolic chain lands on, without requiring it
    /// to exist. A detached HEAD resolves to HEAD itself.
    pub fn current_ref(&self, source: Option<RefName>) -> anyhow::Result<RefName> {
        let mut current = source.unwrap_or_else(RefName::head);

        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read_raw(&current)? {
                Some(RefValue::Symbolic(target)) => current = target,
                Some(RefValue::Direct(_)) | None => return Ok(current),
            }
        }

        Err(SourceError::RefCycle {
            name: current.to_string(),
        }
        .into())
    }

    /// Compare-and-set update of a single reference file.
    ///
    /// `expected_old` of `None` means the reference must not exist yet; a
    /// mismatch either way is `RefRace`. No indirection is followed; pass
    /// the final name (see `update_head` for the HEAD-following variant).
    pub fn update(
        &self,
        name: &RefName,
        new_oid: ObjectId,
        expected_old: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        let observed = match self.read_raw(name)? {
            Some(RefValue::Direct(oid)) => Some(oid),
            Some(RefValue::Symbolic(_)) => None,
            None => None,
        };

        if observed.as_ref() != expected_old {
            return Err(SourceError::RefRace {
                name: name.to_string(),
            }
            .into());
        }

        self.write_ref_file(name, &format!("{}\n", new_oid))
    }

    /// Overwrite a reference unconditionally (used by checkout and reset,
    /// where the caller has already decided the outcome).
    pub fn force_update(&self, name: &RefName, new_oid: ObjectId) -> anyhow::Result<()> {
        self.write_ref_file(name, &format!("{}\n", new_oid))
    }

    /// Point a reference at another reference.
    pub fn create_symref(&self, name: &RefName, target: &RefName) -> anyhow::Result<()> {
        self.write_ref_file(name, &format!("ref: {}\n", target))
    }

    /// Advance whatever HEAD currently designates: the checked-out branch
    /// when HEAD is symbolic, HEAD itself when detached.
    pub fn update_head(&self, oid: ObjectId) -> anyhow::Result<()> {
        let target = self.current_ref(None)?;
        self.force_update(&target, oid)
    }

    /// Detach HEAD directly onto a digest.
    pub fn set_head_detached(&self, oid: ObjectId) -> anyhow::Result<()> {
        self.force_update(&RefName::head(), oid)
    }

    /// Attach HEAD to a branch.
    pub fn set_head_branch(&self, branch: &RefName) -> anyhow::Result<()> {
        self.create_symref(&RefName::head(), branch)
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.resolve_optional(&RefName::head())
    }

    /// Whether HEAD is a direct digest rather than a symbolic pointer.
    pub fn is_head_detached(&self) -> anyhow::Result<bool> {
        Ok(matches!(
            self.read_raw(&RefName::head())?,
            Some(RefValue::Direct(_))
        ))
    }

    /// Delete a reference file and prune now-empty parent directories.
    pub fn delete(&self, name: &RefName) -> anyhow::Result<ObjectId> {
        let ref_path = self.path.join(name.as_ref_path());

        let oid = self.resolve(name)?;
        std::fs::remove_file(&ref_path)
            .with_context(|| format!("unable to delete ref file {}", ref_path.display()))?;
        self.prune_empty_parent_dirs(&ref_path)?;

        Ok(oid)
    }

    /// List references whose full name starts with the given prefix, in
    /// name order. An empty prefix lists everything under `refs/` plus
    /// HEAD.
    pub fn list(&self, prefix: &str) -> anyhow::Result<Vec<RefName>> {
        let mut names = Vec::new();

        let scan_root = self.path.join("refs");
        if scan_root.exists() {
            for entry in walkdir::WalkDir::new(&scan_root) {
                let entry = entry?;
                if !entry.path().is_file() {
                    continue;
                }

                let relative = entry
                    .path()
                    .strip_prefix(self.path.as_ref())
                    .context("ref path escapes repository directory")?;
                let name = relative.to_string_lossy().replace('\\', "/");

                if name.starts_with(prefix)
                    && let Ok(ref_name) = RefName::try_parse(&name)
                {
                    names.push(ref_name);
                }
            }
        }

        if HEAD.starts_with(prefix) && self.path.join(HEAD).exists() {
            names.push(RefName::head());
        }

        names.sort();
        Ok(names)
    }

    fn write_ref_file(&self, name: &RefName, contents: &str) -> anyhow::Result<()> {
        let ref_path = self.path.join(name.as_ref_path());
        let dir = ref_path
            .parent()
            .context("ref path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("unable to create ref directory {}", dir.display()))?;

        let temp_path = dir.join(format!(
            ".tmp-ref-{}-{}",
            std::process::id(),
            ref_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("ref")
        ));

        let mut file = std::fs::File::create(&temp_path)
            .with_context(|| format!("unable to open ref file {}", temp_path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("unable to write ref file {}", temp_path.display()))?;

        std::fs::rename(&temp_path, &ref_path)
            .with_context(|| format!("unable to rename ref file to {}", ref_path.display()))?;

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let stop = self.path.join("refs");

        if let Some(parent) = path.parent()
            && parent != stop.as_path()
            && parent.starts_with(&stop)
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)
                .with_context(|| format!("unable to remove empty ref directory {}", parent.display()))?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }
}

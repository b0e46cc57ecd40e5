//! Working-tree operations
//!
//! The workspace is the mutable file tree outside the repository directory.
//! Everything here speaks repository-relative paths; the repository
//! directory itself is never listed or touched.

use crate::artifacts::core::error::SourceError;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::entry_mode::EntryMode;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Paths never considered part of the working tree
const IGNORED_PATHS: [&str; 3] = [".source", ".", ".."];

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a caller-supplied path to repository-relative form.
    ///
    /// Fails with `PathOutsideRepo` when the path escapes the root.
    pub fn relativize(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.path.join(path)
        };

        let absolute = normalize(&absolute);
        absolute
            .strip_prefix(self.path.as_ref())
            .map(Path::to_path_buf)
            .map_err(|_| {
                SourceError::PathOutsideRepo {
                    path: path.to_path_buf(),
                }
                .into()
            })
    }

    /// All regular files under a starting point, repository-relative.
    pub fn list_files(&self, root: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root = match root {
            Some(path) => self.path.join(self.relativize(path)?),
            None => self.path.to_path_buf(),
        };

        if !root.exists() {
            anyhow::bail!("path does not exist: {}", root.display());
        }

        if root.is_file() {
            return Ok(vec![
                root.strip_prefix(self.path.as_ref())
                    .map(PathBuf::from)
                    .unwrap_or_default(),
            ]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root) {
            let entry = entry?;
            if entry.path().is_file()
                && !Self::is_ignored(entry.path())
                && let Ok(relative) = entry.path().strip_prefix(self.path.as_ref())
            {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);

        let content = std::fs::read(&full_path)
            .with_context(|| format!("unable to read file {}", full_path.display()))?;
        Ok(Bytes::from(content))
    }

    pub fn file_exists(&self, file_path: &Path) -> bool {
        self.path.join(file_path).is_file()
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::metadata(&full_path)
            .with_context(|| format!("unable to stat file {}", full_path.display()))?;

        (full_path.as_path(), metadata).try_into()
    }

    /// Write file contents, creating parent directories and applying the
    /// executable bit for `Executable` mode entries.
    pub fn write_file(
        &self,
        file_path: &Path,
        data: &[u8],
        mode: EntryMode,
    ) -> anyhow::Result<()> {
        let full_path = self.path.join(file_path);

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("unable to create directory {}", parent.display()))?;
        }

        // a directory occupying the target path has to give way
        if full_path.is_dir() {
            std::fs::remove_dir_all(&full_path)
                .with_context(|| format!("unable to clear directory {}", full_path.display()))?;
        }

        std::fs::write(&full_path, data)
            .with_context(|| format!("unable to write file {}", full_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = match mode {
                EntryMode::Executable => std::fs::Permissions::from_mode(0o755),
                _ => std::fs::Permissions::from_mode(0o644),
            };
            std::fs::set_permissions(&full_path, permissions).with_context(|| {
                format!("unable to set permissions on {}", full_path.display())
            })?;
        }

        Ok(())
    }

    /// Remove a file and prune parent directories left empty, stopping at
    /// the repository root.
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let full_path = self.path.join(file_path);

        match std::fs::remove_file(&full_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context(format!("unable to remove file {}", full_path.display())));
            }
        }

        let mut parent = full_path.parent();
        while let Some(dir) = parent {
            if dir == self.path.as_ref() || dir.read_dir()?.next().is_some() {
                break;
            }
            std::fs::remove_dir(dir)
                .with_context(|| format!("unable to remove directory {}", dir.display()))?;
            parent = dir.parent();
        }

        Ok(())
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| {
            if let std::path::Component::Normal(name) = component {
                IGNORED_PATHS.contains(&name.to_string_lossy().as_ref())
            } else {
                false
            }
        })
    }
}

/// Lexically normalize `.` and `..` components without touching the
/// filesystem, so escapes are caught even for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::core::error::as_source_error;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace() -> (TempDir, Workspace) {
        let temp = TempDir::new().expect("temp dir");
        let workspace = Workspace::new(temp.path().to_path_buf().into_boxed_path());
        (temp, workspace)
    }

    #[rstest]
    fn test_list_skips_repository_directory(workspace: (TempDir, Workspace)) {
        let (temp, workspace) = workspace;
        std::fs::create_dir_all(temp.path().join(".source/objects")).unwrap();
        std::fs::write(temp.path().join(".source/HEAD"), "ref: refs/heads/master\n").unwrap();
        std::fs::write(temp.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/lib.rs"), "pub fn x() {}").unwrap();

        let files = workspace.list_files(None).unwrap();

        assert_eq!(
            files,
            vec![PathBuf::from("a.txt"), PathBuf::from("src/lib.rs")]
        );
    }

    #[rstest]
    fn test_relativize_rejects_escapes(workspace: (TempDir, Workspace)) {
        let (_temp, workspace) = workspace;

        let err = workspace.relativize(Path::new("../outside.txt")).unwrap_err();
        assert!(matches!(
            as_source_error(&err),
            Some(SourceError::PathOutsideRepo { .. })
        ));
    }

    #[rstest]
    fn test_write_then_read_round_trip(workspace: (TempDir, Workspace)) {
        let (_temp, workspace) = workspace;
        let path = Path::new("nested/dir/file.txt");

        workspace
            .write_file(path, b"contents\n", EntryMode::Regular)
            .unwrap();

        assert_eq!(&workspace.read_file(path).unwrap()[..], b"contents\n");
    }

    #[rstest]
    fn test_remove_file_prunes_empty_directories(workspace: (TempDir, Workspace)) {
        let (temp, workspace) = workspace;
        let path = Path::new("a/b/c.txt");
        workspace
            .write_file(path, b"x", EntryMode::Regular)
            .unwrap();

        workspace.remove_file(path).unwrap();

        assert!(!temp.path().join("a").exists());
    }
}

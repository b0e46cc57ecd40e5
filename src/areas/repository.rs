//! Repository facade
//!
//! The `Repository` owns handles to every area (object database, index,
//! reference store, workspace, configuration, merge state) and is the
//! entry point for all operations. There is no global state: every
//! operation goes through an explicit repository value.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::core::error::SourceError;
use crate::artifacts::merge::state::MergeState;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::person::Person;
use std::cell::RefMut;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Repository directory name
pub const SOURCE_DIR: &str = ".source";

/// Object database directory name
const DATABASE_DIR: &str = "objects";

/// Index file name
const INDEX_FILE: &str = "index";

/// Configuration file name
const CONFIG_FILE: &str = "config";

/// A repository rooted at a working directory.
///
/// The index is behind an async mutex so operations that mutate it
/// serialize; the other areas are safe for shared reads.
pub struct Repository {
    /// Working-directory root
    path: Box<Path>,
    /// Output writer (stdout in the binary, a buffer in tests)
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: Config,
    merge_state: MergeState,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open a repository at exactly this root (creating the directory when
    /// missing). Used by `init`; existing repositories are usually opened
    /// with `discover`.
    pub fn new(path: PathBuf, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }
        let path = path.canonicalize()?;
        let source = path.join(SOURCE_DIR);

        Ok(Repository {
            writer: RefCell::new(writer),
            index: Arc::new(Mutex::new(Index::new(
                source.join(INDEX_FILE).into_boxed_path(),
            ))),
            database: Database::new(source.join(DATABASE_DIR).into_boxed_path()),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(source.clone().into_boxed_path()),
            config: Config::new(source.join(CONFIG_FILE).into_boxed_path()),
            merge_state: MergeState::new(source.into_boxed_path()),
            path: path.into_boxed_path(),
        })
    }

    /// Find the repository containing `start` by walking upward until a
    /// `.source` directory appears.
    pub fn discover(start: PathBuf, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let start = start.canonicalize()?;

        let mut current = start.as_path();
        loop {
            if current.join(SOURCE_DIR).is_dir() {
                return Self::new(current.to_path_buf(), writer);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => {
                    return Err(SourceError::NotARepository { start }.into());
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_path(&self) -> PathBuf {
        self.path.join(SOURCE_DIR)
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn merge_state(&self) -> &MergeState {
        &self.merge_state
    }

    /// The commit HEAD resolves to, if any.
    pub fn head_commit(&self) -> anyhow::Result<Option<Commit>> {
        match self.refs.read_head()? {
            Some(oid) => Ok(Some(self.database.load_commit(&oid)?)),
            None => Ok(None),
        }
    }

    /// Commit authorship: environment first, then `user.name`/`user.email`
    /// from the configuration.
    pub fn author(&self) -> anyhow::Result<Person> {
        if let Some(person) = Person::from_env() {
            return Ok(person);
        }

        let name = self.config.get("user.name")?;
        let email = self.config.get("user.email")?;

        match (name, email) {
            (Some(name), Some(email)) => Ok(Person::new(name, email)),
            _ => anyhow::bail!(
                "author identity unknown: set GIT_AUTHOR_NAME/GIT_AUTHOR_EMAIL or user.name/user.email"
            ),
        }
    }

    /// Resolve a revision expression to a commit digest.
    pub fn resolve_revision(&self, expr: &str) -> anyhow::Result<ObjectId> {
        Revision::try_parse(expr)?.resolve(&self.database, &self.refs)
    }
}

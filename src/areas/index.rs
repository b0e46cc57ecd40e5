//! Staging index
//!
//! The index is the bridge between the mutable working tree and the
//! immutable object graph: stage-0 entries describe the tree the next
//! commit will snapshot, and stages 1–3 hold the sides of unresolved merge
//! conflicts.
//!
//! Entries are kept strictly sorted by `(path, stage)` and persisted in the
//! v2 binary format with a trailing SHA-1. The on-disk write is atomic via
//! write-temp-then-rename; concurrent mutation is the caller's problem to
//! serialize.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::HEADER_SIZE;
use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::index::conflict::ConflictEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry, Stage, path_key};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeBuilder};
use crate::areas::database::Database;
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// The staging table mediating working tree and tree objects.
#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.source/index`)
    path: Box<Path>,
    /// Entries keyed by (canonical path, stage); BTreeMap keeps them sorted
    entries: BTreeMap<(String, Stage), IndexEntry>,
    /// Directory key → stage-0 children, for file/directory conflicts
    children: BTreeMap<String, BTreeSet<String>>,
    header: IndexHeader,
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index from disk, or start empty when no file exists yet.
    ///
    /// Validates the header and the trailing checksum; both failures are
    /// `CorruptIndex`.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("unable to open index at {}", self.path.display()))?;

        if file.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = ChecksumReader::new(file);

        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(&header_bytes)?;
        header.validate()?;

        for _ in 0..header.entries_count {
            let entry = IndexEntry::read_from(&mut reader)?;
            self.store_entry(entry)?;
        }

        self.header = header;
        reader.verify()
    }

    /// Persist the index atomically: temp file in the same directory, then
    /// rename over the real path.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let mut writer = ChecksumWriter::new(Vec::new());

        self.header = IndexHeader::new(
            self.header.marker.clone(),
            self.header.version,
            self.entries.len() as u32,
        );
        writer.write(&self.header.serialize()?)?;

        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }

        let bytes = writer.finish()?;

        let dir = self
            .path
            .parent()
            .context("index path has no parent directory")?;
        let temp_path = dir.join(format!("index-tmp-{}", std::process::id()));

        std::fs::write(&temp_path, &bytes)
            .with_context(|| format!("unable to write index at {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("unable to rename index to {}", self.path.display()))?;

        self.changed = false;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.changed = false;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Stage-0 entry for a path, if present.
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        let key = path_key(path).ok()?;
        self.entries.get(&(key, 0))
    }

    pub fn entry_at_stage(&self, path: &Path, stage: Stage) -> Option<&IndexEntry> {
        let key = path_key(path).ok()?;
        self.entries.get(&(key, stage))
    }

    /// All entries in (path, stage) order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage-0 entries only.
    pub fn tracked_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values().filter(|entry| entry.stage == 0)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        match path_key(path) {
            Ok(key) => {
                self.entries.range((key.clone(), 0)..=(key.clone(), 3)).next().is_some()
                    || self.children.contains_key(&key)
            }
            Err(_) => false,
        }
    }

    /// Stage a file at stage 0, displacing conflicting entries.
    ///
    /// Staging resolves any recorded conflict for the path, and removes
    /// entries that would collide across the file/directory boundary (a
    /// file `a` displaces entries under `a/`, and vice versa).
    pub fn add(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        let key = entry.path_key()?;

        self.discard_path_conflicts(&entry)?;
        self.remove_stages(&key, &[1, 2, 3]);
        self.store_entry(entry)?;
        self.changed = true;

        Ok(())
    }

    /// Remove every stage of a path, and everything beneath it when the
    /// path names a tracked directory.
    pub fn remove(&mut self, path: &Path) -> anyhow::Result<()> {
        let key = path_key(path)?;

        self.remove_stages(&key, &[0, 1, 2, 3]);
        self.remove_children(&key);
        self.changed = true;

        Ok(())
    }

    /// Record a three-way conflict: stages 1–3 for the sides that exist,
    /// and no stage-0 entry.
    pub fn add_conflict(
        &mut self,
        path: &Path,
        base: Option<DatabaseEntry>,
        ours: Option<DatabaseEntry>,
        theirs: Option<DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let key = path_key(path)?;
        self.remove_stages(&key, &[0, 1, 2, 3]);

        for (stage, side) in [(1, base), (2, ours), (3, theirs)] {
            if let Some(side) = side {
                let entry =
                    IndexEntry::new_staged(path.to_path_buf(), side.oid, stage, side.mode);
                self.store_entry(entry)?;
            }
        }

        self.changed = true;
        Ok(())
    }

    /// Drop stages 1–3 for a path and install the resolved digest at
    /// stage 0.
    pub fn resolve_conflict(&mut self, path: &Path, oid: ObjectId) -> anyhow::Result<()> {
        let key = path_key(path)?;

        if !self.is_conflicted(path) {
            anyhow::bail!("no conflict recorded for path {}", key);
        }

        let mode = self
            .entries
            .get(&(key.clone(), 2))
            .map(|entry| entry.metadata.mode)
            .unwrap_or(EntryMode::Regular);

        self.remove_stages(&key, &[1, 2, 3]);
        self.store_entry(IndexEntry::new_staged(path.to_path_buf(), oid, 0, mode))?;
        self.changed = true;

        Ok(())
    }

    /// A path is conflicted iff stages 1–3 exist and stage 0 does not.
    pub fn is_conflicted(&self, path: &Path) -> bool {
        match path_key(path) {
            Ok(key) => {
                self.entries.get(&(key.clone(), 0)).is_none()
                    && (1..=3).any(|stage| self.entries.contains_key(&(key.clone(), stage)))
            }
            Err(_) => false,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.values().any(|entry| entry.stage > 0)
    }

    /// Aggregate stages 1/2/3 into per-path conflict records, in path order.
    pub fn conflicts(&self) -> Vec<ConflictEntry> {
        let mut conflicts: BTreeMap<String, ConflictEntry> = BTreeMap::new();

        for ((key, stage), entry) in &self.entries {
            if *stage == 0 {
                continue;
            }
            conflicts
                .entry(key.clone())
                .or_insert_with(|| ConflictEntry::new(key.clone()))
                .set_stage(*stage, entry.oid);
        }

        conflicts.into_values().collect()
    }

    /// Refresh the stat metadata of an existing stage-0 entry.
    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Ok(key) = path_key(path)
            && let Some(entry) = self.entries.get_mut(&(key, 0))
        {
            entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Build tree objects from the stage-0 entries, bottom-up, storing each
    /// through the database, and return the root tree digest.
    pub fn build_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        let mut builder = TreeBuilder::new();
        for entry in self.tracked_entries() {
            builder.insert(&entry.name, entry.oid, entry.metadata.mode)?;
        }

        builder.finish(&mut |tree: &Tree| {
            database.store(tree)?;
            Ok(())
        })
    }

    /// Replace the index contents with a tree's, recursively.
    ///
    /// Used by checkout-style flows and `reset --mixed`. The entries carry
    /// fresh (zeroed) stat metadata; the caller refreshes stats for paths it
    /// materializes in the workspace.
    pub fn load_tree(&mut self, database: &Database, tree_oid: &ObjectId) -> anyhow::Result<()> {
        self.clear();
        let tree = database.load_tree(tree_oid)?;
        self.read_tree_into(database, &tree, &PathBuf::new())?;
        self.changed = true;
        Ok(())
    }

    fn read_tree_into(
        &mut self,
        database: &Database,
        tree: &Tree,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        for tree_entry in tree.entries() {
            let path = prefix.join(tree_entry.name());

            if tree_entry.is_tree() {
                let subtree = database.load_tree(tree_entry.oid())?;
                self.read_tree_into(database, &subtree, &path)?;
            } else {
                self.store_entry(IndexEntry::new_staged(
                    path,
                    *tree_entry.oid(),
                    0,
                    tree_entry.mode(),
                ))?;
            }
        }

        Ok(())
    }

    fn store_entry(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        let key = entry.path_key()?;

        if entry.stage == 0 {
            for parent in entry.parent_dirs() {
                let parent_key = path_key(parent)?;
                self.children
                    .entry(parent_key)
                    .or_default()
                    .insert(key.clone());
            }
        }

        self.entries.insert((key, entry.stage), entry);
        Ok(())
    }

    /// Remove entries that cannot coexist with the new one: ancestor
    /// directories tracked as files, and tracked files beneath the new
    /// path when it used to be a directory.
    fn discard_path_conflicts(&mut self, entry: &IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs() {
            let parent_key = path_key(parent)?;
            self.remove_stages(&parent_key, &[0, 1, 2, 3]);
        }

        let key = entry.path_key()?;
        self.remove_children(&key);
        Ok(())
    }

    fn remove_stages(&mut self, key: &str, stages: &[Stage]) {
        for stage in stages {
            if let Some(entry) = self.entries.remove(&(key.to_string(), *stage))
                && entry.stage == 0
            {
                self.forget_child(&entry);
            }
        }
    }

    fn remove_children(&mut self, key: &str) {
        if let Some(children) = self.children.remove(key) {
            for child in children {
                self.remove_stages(&child, &[0, 1, 2, 3]);
            }
        }
    }

    fn forget_child(&mut self, entry: &IndexEntry) {
        let Ok(key) = entry.path_key() else {
            return;
        };

        for parent in entry.parent_dirs() {
            if let Ok(parent_key) = path_key(parent)
                && let Some(children) = self.children.get_mut(&parent_key)
            {
                children.remove(&key);
                if children.is_empty() {
                    self.children.remove(&parent_key);
                }
            }
        }
    }
}

//! Tree object
//!
//! Trees are directory snapshots: an ordered list of `(mode, name, digest)`
//! entries whose leaves are blobs and whose interior entries are other
//! trees.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`, each entry `<octal-mode> <name>\0<20-byte digest>`
//! with no separator between entries.
//!
//! ## Ordering
//!
//! Entries are sorted by the comparator that treats a directory as if its
//! name carried a trailing `/`. That puts `src-old` before `src` before
//! `srcX` when `src` is a directory, matching the byte order produced by
//! other implementations of this format.

use crate::artifacts::core::error::SourceError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{
    DigestCell, Object, Packable, Unpackable, digest_framed, frame,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Component, Path};

/// A named entry inside a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    name: String,
    entry: DatabaseEntry,
}

impl TreeEntry {
    pub fn new(name: String, entry: DatabaseEntry) -> Self {
        TreeEntry { name, entry }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oid(&self) -> &ObjectId {
        &self.entry.oid
    }

    pub fn mode(&self) -> EntryMode {
        self.entry.mode
    }

    pub fn entry(&self) -> &DatabaseEntry {
        &self.entry
    }

    pub fn is_tree(&self) -> bool {
        self.entry.mode.is_tree()
    }

    /// The comparator key: directories sort as `name/`.
    fn sort_key(&self) -> String {
        if self.is_tree() {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Check a single path component used as a tree entry name.
pub fn validate_entry_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(SourceError::InvalidPath { path: name.into() }.into());
    }
    Ok(())
}

/// Directory snapshot: ordered set of (mode, name, digest) entries.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
    digest: DigestCell,
}

impl Tree {
    /// Create a tree, sorting entries with the directory-suffix comparator
    /// and rejecting invalid or duplicate names.
    pub fn try_new(mut entries: Vec<TreeEntry>) -> anyhow::Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                anyhow::bail!("duplicate tree entry '{}'", pair[0].name);
            }
        }

        Ok(Tree {
            entries,
            digest: DigestCell::new(),
        })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.entry)
    }

    /// Name → entry map, the shape the diff and merge engines consume.
    pub fn to_map(&self) -> BTreeMap<String, DatabaseEntry> {
        self.entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.entry.clone()))
            .collect()
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Tree {}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut body = Vec::new();

        for tree_entry in &self.entries {
            let header = format!("{} {}", tree_entry.mode().as_octal_str(), tree_entry.name);
            body.write_all(header.as_bytes())?;
            body.push(0);
            tree_entry.oid().write_raw_to(&mut body)?;
        }

        frame(ObjectType::Tree, &body)
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(SourceError::malformed_object("unexpected EOF in tree mode").into());
            }

            let mode_str = std::str::from_utf8(&mode_bytes)
                .map_err(|_| SourceError::malformed_object("tree mode is not ascii"))?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(SourceError::malformed_object("unexpected EOF in tree name").into());
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| SourceError::malformed_object("tree name is not utf-8"))?
                .to_owned();

            let oid = ObjectId::read_raw_from(&mut reader)
                .context("unexpected EOF in tree entry digest")?;

            entries.push(TreeEntry::new(name, DatabaseEntry::new(oid, mode)));
        }

        Tree::try_new(entries)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|tree_entry| {
                let object_type = if tree_entry.is_tree() { "tree" } else { "blob" };
                format!(
                    "{} {} {}\t{}",
                    tree_entry.mode().as_octal_str(),
                    object_type,
                    tree_entry.oid(),
                    tree_entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn object_id(&self) -> anyhow::Result<ObjectId> {
        self.digest
            .get_or_compute(|| digest_framed(&self.serialize()?))
    }
}

/// Bottom-up tree construction from flat paths
///
/// Collects `(path, digest, mode)` rows, organizes them into nested
/// directories, and emits every subtree post-order so children are stored
/// before the parents that reference them.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    root: BTreeMap<String, TreeNode>,
}

#[derive(Debug)]
enum TreeNode {
    File { oid: ObjectId, mode: EntryMode },
    Directory { children: BTreeMap<String, TreeNode> },
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at a repository-relative path, creating intermediate
    /// directories.
    pub fn insert(&mut self, path: &Path, oid: ObjectId, mode: EntryMode) -> anyhow::Result<()> {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| SourceError::InvalidPath { path: path.into() })?;
                    validate_entry_name(part)?;
                    components.push(part.to_string());
                }
                _ => return Err(SourceError::InvalidPath { path: path.into() }.into()),
            }
        }

        if components.is_empty() {
            return Err(SourceError::InvalidPath { path: path.into() }.into());
        }

        let mut node = &mut self.root;
        let (last, dirs) = components.split_last().expect("checked non-empty");

        for dir in dirs {
            let child = node
                .entry(dir.clone())
                .or_insert_with(|| TreeNode::Directory {
                    children: BTreeMap::new(),
                });

            node = match child {
                TreeNode::Directory { children } => children,
                TreeNode::File { .. } => {
                    return Err(SourceError::InvalidPath { path: path.into() }.into());
                }
            };
        }

        node.insert(last.clone(), TreeNode::File { oid, mode });
        Ok(())
    }

    /// Materialize every subtree post-order through `sink` and return the
    /// root tree's digest. The sink is responsible for persisting each tree.
    pub fn finish<F>(&self, sink: &mut F) -> anyhow::Result<ObjectId>
    where
        F: FnMut(&Tree) -> anyhow::Result<()>,
    {
        Self::finish_node(&self.root, sink)
    }

    fn finish_node<F>(
        children: &BTreeMap<String, TreeNode>,
        sink: &mut F,
    ) -> anyhow::Result<ObjectId>
    where
        F: FnMut(&Tree) -> anyhow::Result<()>,
    {
        let mut entries = Vec::with_capacity(children.len());

        for (name, node) in children {
            let entry = match node {
                TreeNode::File { oid, mode } => DatabaseEntry::new(*oid, *mode),
                TreeNode::Directory { children } => {
                    let subtree_oid = Self::finish_node(children, sink)?;
                    DatabaseEntry::new(subtree_oid, EntryMode::Directory)
                }
            };
            entries.push(TreeEntry::new(name.clone(), entry));
        }

        let tree = Tree::try_new(entries)?;
        sink(&tree)?;
        tree.object_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn blob_oid() -> ObjectId {
        ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap()
    }

    fn file(name: &str, oid: ObjectId) -> TreeEntry {
        TreeEntry::new(name.to_string(), DatabaseEntry::new(oid, EntryMode::Regular))
    }

    fn dir(name: &str, oid: ObjectId) -> TreeEntry {
        TreeEntry::new(
            name.to_string(),
            DatabaseEntry::new(oid, EntryMode::Directory),
        )
    }

    #[rstest]
    fn test_directory_suffix_ordering(blob_oid: ObjectId) {
        let tree = Tree::try_new(vec![
            file("srcX", blob_oid),
            dir("src", blob_oid),
            file("src-old", blob_oid),
        ])
        .unwrap();

        let names: Vec<&str> = tree.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["src-old", "src", "srcX"]);
    }

    #[rstest]
    fn test_rejects_duplicate_names(blob_oid: ObjectId) {
        let result = Tree::try_new(vec![file("a.txt", blob_oid), file("a.txt", blob_oid)]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    fn test_rejects_invalid_names(#[case] name: &str, blob_oid: ObjectId) {
        let result = Tree::try_new(vec![file(name, blob_oid)]);
        assert!(result.is_err());
    }

    #[rstest]
    fn test_serialize_parse_round_trip(blob_oid: ObjectId) {
        let tree = Tree::try_new(vec![file("a.txt", blob_oid), dir("lib", blob_oid)]).unwrap();

        let framed = tree.serialize().unwrap();
        let nul = framed.iter().position(|&b| b == 0).unwrap();
        let parsed = Tree::deserialize(std::io::Cursor::new(framed[nul + 1..].to_vec())).unwrap();

        assert_eq!(parsed, tree);
        assert_eq!(parsed.object_id().unwrap(), tree.object_id().unwrap());
    }

    #[rstest]
    fn test_known_single_entry_digest(blob_oid: ObjectId) {
        // Matches the tree that other implementations of this format produce
        // for a single `a.txt` holding "hello\n".
        let tree = Tree::try_new(vec![file("a.txt", blob_oid)]).unwrap();

        assert_eq!(
            tree.object_id().unwrap().to_hex(),
            "2e81171448eb9f2ee3821e3d447aa6b2fe3ddba1"
        );
    }

    #[rstest]
    fn test_builder_nests_directories(blob_oid: ObjectId) {
        let mut builder = TreeBuilder::new();
        builder
            .insert(Path::new("a/b/c.txt"), blob_oid, EntryMode::Regular)
            .unwrap();
        builder
            .insert(Path::new("top.txt"), blob_oid, EntryMode::Regular)
            .unwrap();

        let mut stored = Vec::new();
        let root_oid = builder
            .finish(&mut |tree: &Tree| {
                stored.push(tree.clone());
                Ok(())
            })
            .unwrap();

        // post-order: c.txt's tree, then a/b's parent, then the root
        assert_eq!(stored.len(), 3);
        let root = stored.last().unwrap();
        assert_eq!(root.object_id().unwrap(), root_oid);
        assert!(root.get("a").unwrap().mode.is_tree());
        assert!(!root.get("top.txt").unwrap().mode.is_tree());
    }

    #[rstest]
    fn test_builder_rejects_file_shadowed_by_directory(blob_oid: ObjectId) {
        let mut builder = TreeBuilder::new();
        builder
            .insert(Path::new("a"), blob_oid, EntryMode::Regular)
            .unwrap();

        let result = builder.insert(Path::new("a/b.txt"), blob_oid, EntryMode::Regular);
        assert!(result.is_err());
    }
}

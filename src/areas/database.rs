//! Object database
//!
//! The database persists all objects (blobs, trees, commits, tags) under
//! content-addressable storage. Objects are identified by their SHA-1 digest
//! and stored zlib-compressed in a directory fan-out keyed on the digest
//! prefix.
//!
//! ## Storage Format
//!
//! - Path: `.source/objects/ab/cdef123...` (first 2 hex chars as directory)
//! - Content: zlib-compressed framed bytes (`<kind> <size>\0<body>`)
//!
//! Writes are idempotent and atomic: bytes land in a uniquely named sibling
//! file first and are renamed into place, so concurrent readers never see a
//! partial object. Reads verify that the recomputed digest matches the
//! lookup key before returning.

use crate::artifacts::core::error::SourceError;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable, digest_framed};
use crate::artifacts::objects::object_id::{ObjectId, validate_prefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use anyhow::Context;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content-addressed object store rooted at `.source/objects`.
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store an object, returning its digest.
    ///
    /// A no-op when the target file already exists: identical digests imply
    /// identical bytes under the collision assumption, and the first
    /// writer's bytes are retained.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let oid = object.object_id()?;
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            let framed = object.serialize()?;
            self.write_object(&object_path, framed)?;
        }

        Ok(oid)
    }

    /// Load and verify the object stored under a digest.
    ///
    /// Fails with `UnknownDigest` when no such object exists, with
    /// `MalformedObject` when the framed header does not parse, and with
    /// `CorruptObject` when the recomputed digest disagrees with the key.
    pub fn load(&self, oid: &ObjectId) -> anyhow::Result<ObjectBox> {
        let framed = self.read_object(oid)?;

        let recomputed = digest_framed(&framed)?;
        if recomputed != *oid {
            return Err(SourceError::CorruptObject {
                oid: oid.to_hex(),
            }
            .into());
        }

        let mut reader = Cursor::new(framed);
        let (object_type, declared_size) = ObjectType::parse_header(&mut reader)?;

        let body_len = reader.get_ref().len() - reader.position() as usize;
        if body_len != declared_size {
            return Err(SourceError::malformed_object(format!(
                "declared size {} but body holds {} bytes",
                declared_size, body_len
            ))
            .into());
        }

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Blob::deserialize(reader)?)),
            ObjectType::Tree => Ok(ObjectBox::Tree(Tree::deserialize(reader)?)),
            ObjectType::Commit => Ok(ObjectBox::Commit(Commit::deserialize(reader)?)),
            ObjectType::Tag => Ok(ObjectBox::Tag(Tag::deserialize(reader)?)),
        }
    }

    /// Load an object that must be a commit.
    pub fn load_commit(&self, oid: &ObjectId) -> anyhow::Result<Commit> {
        match self.load(oid)? {
            ObjectBox::Commit(commit) => Ok(commit),
            other => anyhow::bail!("object {} is a {}, not a commit", oid, other.object_type()),
        }
    }

    /// Load an object that must be a tree; a commit is followed to its tree.
    pub fn load_tree(&self, oid: &ObjectId) -> anyhow::Result<Tree> {
        match self.load(oid)? {
            ObjectBox::Tree(tree) => Ok(tree),
            ObjectBox::Commit(commit) => self.load_tree(commit.tree_oid()),
            other => anyhow::bail!("object {} is a {}, not a tree", oid, other.object_type()),
        }
    }

    /// Load an object that must be a blob.
    pub fn load_blob(&self, oid: &ObjectId) -> anyhow::Result<Blob> {
        match self.load(oid)? {
            ObjectBox::Blob(blob) => Ok(blob),
            other => anyhow::bail!("object {} is a {}, not a blob", oid, other.object_type()),
        }
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.path.join(oid.to_path()).exists()
    }

    /// Enumerate every digest present in the store.
    pub fn iterate(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut oids = Vec::new();

        if !self.path.exists() {
            return Ok(oids);
        }

        for entry in walkdir::WalkDir::new(self.path.as_ref())
            .min_depth(2)
            .max_depth(2)
        {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }

            let dir = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            let file = entry.file_name().to_str();

            if let (Some(dir), Some(file)) = (dir, file)
                && let Ok(oid) = ObjectId::try_parse(&format!("{}{}", dir, file))
            {
                oids.push(oid);
            }
        }

        oids.sort();
        Ok(oids)
    }

    /// Resolve an abbreviated digest (>= 4 hex chars) to the unique object
    /// it identifies.
    pub fn resolve_prefix(&self, prefix: &str) -> anyhow::Result<ObjectId> {
        validate_prefix(prefix)?;

        let matches = self.find_by_prefix(prefix)?;
        match matches.len() {
            0 => Err(SourceError::UnknownDigest {
                digest: prefix.to_string(),
            }
            .into()),
            1 => Ok(matches[0]),
            count => Err(SourceError::AmbiguousDigest {
                prefix: prefix.to_string(),
                count,
            }
            .into()),
        }
    }

    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let mut matches = Vec::new();

        // A prefix of four or more chars pins the fan-out directory
        let dir_name = &prefix[..2];
        let file_prefix = &prefix[2..];
        let dir_path = self.path.join(dir_name);

        if dir_path.is_dir() {
            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();

                if file_name.starts_with(file_prefix)
                    && let Ok(oid) = ObjectId::try_parse(&format!("{}{}", dir_name, file_name))
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    fn read_object(&self, oid: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(oid.to_path());

        let compressed = match std::fs::read(&object_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::UnknownDigest {
                    digest: oid.to_hex(),
                }
                .into());
            }
            Err(err) => {
                return Err(anyhow::Error::from(SourceError::Io(err))
                    .context(format!("unable to read object file {}", object_path.display())));
            }
        };

        Self::decompress(compressed.into())
    }

    fn write_object(&self, object_path: &Path, framed: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context("object path has no parent directory")?;
        std::fs::create_dir_all(object_dir).with_context(|| {
            format!("unable to create object directory {}", object_dir.display())
        })?;

        let temp_path = object_dir.join(Self::generate_temp_name());
        let compressed = Self::compress(framed)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("unable to open object file {}", temp_path.display()))?;
        file.write_all(&compressed)
            .with_context(|| format!("unable to write object file {}", temp_path.display()))?;

        // rename makes the publish atomic against concurrent readers
        std::fs::rename(&temp_path, object_path).with_context(|| {
            format!("unable to rename object file to {}", object_path.display())
        })?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(Bytes::from)
            .context("unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("unable to decompress object content")?;

        Ok(Bytes::from(decompressed))
    }

    fn generate_temp_name() -> String {
        format!(
            "tmp-obj-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }
}

/// Commit cache for graph traversal algorithms
///
/// Traversals touch the same commits repeatedly; this cache parses each one
/// once and hands out slim views. Interior mutability lets loader closures
/// share the cache without threading `&mut` through the algorithms.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: RefCell<HashMap<ObjectId, SlimCommit>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the slim view of a commit, loading it on first access.
    ///
    /// A dangling digest is reported as `MissingObject`, naming the commit
    /// that was being dereferenced.
    pub fn get_or_load(
        &self,
        database: &Database,
        oid: &ObjectId,
    ) -> anyhow::Result<SlimCommit> {
        if let Some(cached) = self.commits.borrow().get(oid) {
            return Ok(cached.clone());
        }

        let commit = database.load_commit(oid).map_err(|err| {
            match crate::artifacts::core::error::as_source_error(&err) {
                Some(SourceError::UnknownDigest { .. }) => {
                    SourceError::missing_object(oid.to_hex(), "commit graph walk").into()
                }
                _ => err,
            }
        })?;

        let slim = SlimCommit {
            oid: *oid,
            parents: commit.parents().to_vec(),
            timestamp: commit.timestamp(),
        };

        self.commits.borrow_mut().insert(*oid, slim.clone());
        Ok(slim)
    }
}

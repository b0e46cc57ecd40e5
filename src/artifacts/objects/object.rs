//! Core object traits and types
//!
//! This module defines the fundamental traits that all stored objects
//! implement:
//! - `Packable`: serialization to the framed binary format
//! - `Unpackable`: deserialization from the framed binary format
//! - `Object`: common object operations (digest computation, display)
//!
//! ## Object Format
//!
//! All objects are stored as:
//! ```text
//! <kind> <size>\0<body>
//! ```
//! The digest is SHA-1 over those framed bytes; the stored file additionally
//! compresses them with zlib.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::cell::OnceCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Trait for serializing objects to the framed binary format
pub trait Packable {
    /// Serialize the object to bytes, including the framed header
    fn serialize(&self) -> Result<Bytes>;
}

/// Trait for deserializing objects from the framed binary format
pub trait Unpackable {
    /// Deserialize the object from a reader (header already consumed)
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// Core stored-object trait
///
/// Implemented by all object kinds (Blob, Tree, Commit, Tag).
pub trait Object: Packable {
    /// Get the object's kind
    fn object_type(&self) -> ObjectType;

    /// Get a human-readable representation
    fn display(&self) -> String;

    /// Compute the object's digest (SHA-1 over the framed bytes)
    fn object_id(&self) -> Result<ObjectId>;

    /// Get the file system path where this object would be stored
    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Wrap a body in the framed header for the given kind.
pub fn frame(object_type: ObjectType, body: &[u8]) -> Result<Bytes> {
    let mut framed = Vec::with_capacity(body.len() + 16);
    let header = format!("{} {}\0", object_type.as_str(), body.len());
    framed.write_all(header.as_bytes())?;
    framed.write_all(body)?;

    Ok(Bytes::from(framed))
}

/// Digest the framed bytes of an object.
pub fn digest_framed(framed: &[u8]) -> Result<ObjectId> {
    let mut hasher = Sha1::new();
    hasher.update(framed);

    Ok(ObjectId::from_bytes(hasher.finalize().into()))
}

/// Lazily computed, cached object digest.
///
/// Objects are immutable once constructed, so the digest can be computed at
/// most once per value. The cell is ignored by equality comparisons.
#[derive(Debug, Clone, Default)]
pub struct DigestCell(OnceCell<ObjectId>);

impl DigestCell {
    pub fn new() -> Self {
        DigestCell(OnceCell::new())
    }

    pub fn get_or_compute(
        &self,
        compute: impl FnOnce() -> Result<ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(cached) = self.0.get() {
            return Ok(*cached);
        }

        let oid = compute()?;
        let _ = self.0.set(oid);
        Ok(oid)
    }
}

/// Tagged container over the four object kinds
///
/// Used when the specific kind isn't known at compile time; all operations
/// that accept "any object" pattern-match on this.
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
            ObjectBox::Tag(tag) => tag.display(),
        }
    }

    pub fn object_id(&self) -> Result<ObjectId> {
        match self {
            ObjectBox::Blob(blob) => blob.object_id(),
            ObjectBox::Tree(tree) => tree.object_id(),
            ObjectBox::Commit(commit) => commit.object_id(),
            ObjectBox::Tag(tag) => tag.object_id(),
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            ObjectBox::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            ObjectBox::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            ObjectBox::Blob(blob) => Some(blob),
            _ => None,
        }
    }
}

//! Blob object
//!
//! Blobs store file contents as opaque bytes. They carry no metadata such as
//! filename or permissions; those live in tree entries.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{
    DigestCell, Object, Packable, Unpackable, digest_framed, frame,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use std::io::{BufRead, Read};

/// File contents, addressed by digest.
///
/// Each unique content is stored once; identical files in different places
/// or commits share the same blob.
#[derive(Debug, Clone, Default)]
pub struct Blob {
    content: Bytes,
    digest: DigestCell,
}

impl Blob {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Blob {
            content: content.into(),
            digest: DigestCell::new(),
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for Blob {}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(ObjectType::Blob, &self.content)
    }
}

impl Unpackable for Blob {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        Ok(Self::new(content))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    fn object_id(&self) -> anyhow::Result<ObjectId> {
        self.digest
            .get_or_compute(|| digest_framed(&self.serialize()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serializes_with_framed_header() {
        let blob = Blob::new("hello\n".as_bytes());

        let framed = blob.serialize().unwrap();
        assert_eq!(&framed[..], b"blob 6\0hello\n");
    }

    #[test]
    fn test_digest_is_stable_across_values() {
        let first = Blob::new("hello\n".as_bytes());
        let second = Blob::new("hello\n".as_bytes());

        assert_eq!(
            first.object_id().unwrap(),
            second.object_id().unwrap()
        );
    }

    #[test]
    fn test_known_digest_for_hello() {
        // printf 'hello\n' | git hash-object --stdin
        let blob = Blob::new("hello\n".as_bytes());

        assert_eq!(
            blob.object_id().unwrap().to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }
}

//! Index entry representation
//!
//! Each entry pairs a tracked path with the blob digest staged for it, the
//! conflict stage it belongs to, and the stat metadata used for fast change
//! detection.
//!
//! ## Entry Format
//!
//! Entries are stored big-endian and padded with 1–8 NUL bytes so the total
//! entry length is a multiple of 8. The 16-bit flags word carries the stage
//! in bits 12–13 and the path byte length (capped at 0xFFF) in the low 12
//! bits.

use crate::artifacts::core::error::SourceError;
use crate::artifacts::index::checksum::ChecksumReader;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{Read, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Maximum path length representable in the flags word
const MAX_PATH_SIZE: usize = 0xFFF;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Fixed portion of an entry before the path bytes
pub const ENTRY_FIXED_SIZE: usize = 62;

/// Minimum size of an index entry in bytes (fixed part + path + padding)
pub const ENTRY_MIN_SIZE: usize = 64;

/// Conflict stage slot: 0 = resolved, 1 = base, 2 = ours, 3 = theirs.
pub type Stage = u8;

/// A tracked file at one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub name: PathBuf,
    /// Blob digest staged for this path
    pub oid: ObjectId,
    /// Conflict stage (0..=3)
    pub stage: Stage,
    /// Stat metadata for change detection
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn new(name: PathBuf, oid: ObjectId, metadata: EntryMetadata) -> Self {
        IndexEntry {
            name,
            oid,
            stage: 0,
            metadata,
        }
    }

    pub fn new_staged(name: PathBuf, oid: ObjectId, stage: Stage, mode: EntryMode) -> Self {
        IndexEntry {
            name,
            oid,
            stage,
            metadata: EntryMetadata {
                mode,
                ..Default::default()
            },
        }
    }

    /// The path in its canonical `/`-separated textual form.
    pub fn path_key(&self) -> anyhow::Result<String> {
        path_key(&self.name)
    }

    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                SourceError::InvalidPath {
                    path: self.name.clone(),
                }
                .into()
            })
    }

    /// Every proper ancestor directory of the entry, shallowest first.
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = Vec::new();
        let mut parent = self.name.parent();

        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.push(dir);
            parent = dir.parent();
        }
        dirs.reverse();
        dirs
    }

    /// Whether recorded size and mode still describe the given stat.
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self.path_key()?;

        let mut entry_bytes = Vec::new();
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_raw_to(&mut entry_bytes)?;

        let flags = ((self.stage as u16 & 0x3) << 12)
            | (entry_name.len().min(MAX_PATH_SIZE) as u16);
        entry_bytes.write_u16::<byteorder::NetworkEndian>(flags)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminator, padded to the 8-byte block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(SourceError::corrupt_index("truncated entry").into());
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode = EntryMode::try_from_u32(byteorder::NetworkEndian::read_u32(&bytes[24..28]))?;
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;

        let mut oid_reader = &bytes[40..60];
        let oid = ObjectId::read_raw_from(&mut oid_reader)?;

        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        let stage = ((flags >> 12) & 0x3) as Stage;
        let declared_len = (flags & 0xFFF) as usize;

        let name_end = bytes[ENTRY_FIXED_SIZE..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| SourceError::corrupt_index("entry path is not NUL-terminated"))?;
        let name_bytes = &bytes[ENTRY_FIXED_SIZE..ENTRY_FIXED_SIZE + name_end];

        if declared_len != name_bytes.len().min(MAX_PATH_SIZE) {
            return Err(SourceError::corrupt_index("entry path length disagrees with flags").into());
        }

        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| SourceError::corrupt_index("entry path is not utf-8"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            stage,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
            },
        })
    }

    /// Read one variable-length entry through the rolling-checksum reader.
    ///
    /// The fixed prefix pins a minimum length; 8-byte blocks are consumed
    /// until the trailing NUL padding appears.
    pub fn read_from<R: Read>(reader: &mut ChecksumReader<R>) -> anyhow::Result<Self> {
        let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

        while entry_bytes[entry_bytes.len() - 1] != 0 {
            entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
        }

        Self::deserialize(&entry_bytes)
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.name.as_os_str(), self.stage).cmp(&(other.name.as_os_str(), other.stage))
    }
}

/// Canonical `/`-separated form of a repository-relative path.
pub fn path_key(path: &Path) -> anyhow::Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| SourceError::InvalidPath {
                    path: path.to_path_buf(),
                })?;
                parts.push(part);
            }
            _ => {
                return Err(SourceError::InvalidPath {
                    path: path.to_path_buf(),
                }
                .into());
            }
        }
    }

    if parts.is_empty() {
        return Err(SourceError::InvalidPath {
            path: path.to_path_buf(),
        }
        .into());
    }

    Ok(parts.join("/"))
}

/// File metadata recorded per index entry
///
/// Comparing this against a fresh stat answers "might this file have
/// changed" without reading its content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Change time (seconds since Unix epoch)
    pub ctime: i64,
    /// Change time nanoseconds
    pub ctime_nsec: i64,
    /// Modification time (seconds since Unix epoch)
    pub mtime: i64,
    /// Modification time nanoseconds
    pub mtime_nsec: i64,
    /// Device ID
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// File mode
    pub mode: EntryMode,
    /// User ID of owner
    pub uid: u32,
    /// Group ID of owner
    pub gid: u32,
    /// File size in bytes
    pub size: u64,
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> anyhow::Result<Self> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if file_path.is_executable() {
            EntryMode::Executable
        } else {
            EntryMode::Regular
        };

        Ok(Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        })
    }
}

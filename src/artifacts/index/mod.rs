//! Index file format
//!
//! The index (staging area) mediates between the working tree and tree
//! objects: it records which blob each tracked path should contribute to
//! the next commit, and carries the three conflict stages during a merge.
//!
//! ## File Format (Version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (4 bytes, big-endian)
//!   - Entry count (4 bytes, big-endian)
//!
//! Entries (variable length, each padded to 8-byte alignment):
//!   - stat metadata, digest, flags word, path
//!   - flags: bits 12-13 carry the stage, low 12 bits the path byte length
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod checksum;
pub mod conflict;
pub mod index_entry;
pub mod index_header;

/// Size of the SHA-1 checksum trailer in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of the index header in bytes
pub const HEADER_SIZE: usize = 12;

/// Magic signature identifying index files
pub const SIGNATURE: &str = "DIRC";

/// Index file format version
pub const VERSION: u32 = 2;

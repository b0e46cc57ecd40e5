//! Object identifier (SHA-1 digest)
//!
//! Object IDs are 160-bit content digests. The canonical textual form is 40
//! lowercase hex characters; an abbreviated form is any prefix of at least
//! four characters. Equality is byte equality on the 20 raw bytes, and the
//! all-zero digest stands for "absent".
//!
//! ## Storage
//!
//! Objects are stored in `.source/objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::core::error::SourceError;
use std::io;
use std::path::PathBuf;

/// Number of raw digest bytes.
pub const OBJECT_ID_SIZE: usize = 20;

/// Number of hex characters in the canonical textual form.
pub const OBJECT_ID_HEX_LENGTH: usize = 40;

/// Shortest abbreviation accepted when resolving a prefix.
pub const MIN_PREFIX_LENGTH: usize = 4;

/// Content digest identifying an object.
///
/// Stored as raw bytes so equality and the zero digest are byte-level
/// contracts; hex is only a presentation concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// The all-zero digest, denoting an absent object.
    pub const ZERO: ObjectId = ObjectId([0; OBJECT_ID_SIZE]);

    pub fn from_bytes(bytes: [u8; OBJECT_ID_SIZE]) -> Self {
        ObjectId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Parse and validate an object ID from its 40-hex textual form.
    pub fn try_parse(id: &str) -> anyhow::Result<Self> {
        if id.len() != OBJECT_ID_HEX_LENGTH {
            anyhow::bail!("invalid object ID length: {}", id.len());
        }

        let mut bytes = [0u8; OBJECT_ID_SIZE];
        for (i, chunk) in id.as_bytes().chunks_exact(2).enumerate() {
            let pair = std::str::from_utf8(chunk)?;
            bytes[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| anyhow::anyhow!("invalid object ID characters: {}", id))?;
        }

        Ok(ObjectId(bytes))
    }

    /// Write the digest in binary form (20 bytes).
    ///
    /// Used when serializing tree entries and the index.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    /// Read a digest from binary form (20 bytes).
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut bytes = [0u8; OBJECT_ID_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(ObjectId(bytes))
    }

    /// Canonical 40-hex textual form.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(OBJECT_ID_HEX_LENGTH);
        for byte in self.0 {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }

    /// Convert to the fan-out path used by the object store.
    ///
    /// `abc123...` becomes `ab/c123...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Standard 7-character abbreviation for display.
    pub fn to_short(&self) -> String {
        self.to_hex()[..7].to_string()
    }
}

/// Validate an abbreviation before prefix resolution.
///
/// Prefixes shorter than four characters or with non-hex characters are
/// rejected as unknown rather than scanned.
pub fn validate_prefix(prefix: &str) -> anyhow::Result<()> {
    if prefix.len() < MIN_PREFIX_LENGTH
        || prefix.len() > OBJECT_ID_HEX_LENGTH
        || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        || prefix.chars().any(|c| c.is_ascii_uppercase())
    {
        return Err(SourceError::UnknownDigest {
            digest: prefix.to_string(),
        }
        .into());
    }
    Ok(())
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;

    #[test]
    fn test_round_trips_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid = ObjectId::try_parse(hex).unwrap();

        assert_eq!(oid.to_hex(), hex);
        assert_eq!(oid.to_short(), "0123456");
    }

    #[test]
    fn test_zero_digest_is_absent() {
        assert!(ObjectId::ZERO.is_zero());
        assert_eq!(
            ObjectId::ZERO.to_hex(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_fan_out_path() {
        let oid = ObjectId::try_parse("abc123456789abcdef0123456789abcdef012345").unwrap();

        assert_eq!(oid.to_path(), PathBuf::from("ab").join("c123456789abcdef0123456789abcdef012345"));
    }

    #[test]
    fn test_rejects_bad_lengths_and_characters() {
        assert!(ObjectId::try_parse("abc").is_err());
        assert!(ObjectId::try_parse(&"g".repeat(40)).is_err());
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_prefix("abcd").is_ok());
        assert!(validate_prefix("abc").is_err());
        assert!(validate_prefix("ABCD").is_err());
        assert!(validate_prefix("xyzw").is_err());
    }

    proptest! {
        #[test]
        fn test_binary_round_trip(bytes in proptest::array::uniform20(0u8..)) {
            let oid = ObjectId::from_bytes(bytes);
            let mut buffer = Vec::new();
            oid.write_raw_to(&mut buffer).unwrap();

            let parsed = ObjectId::read_raw_from(&mut buffer.as_slice()).unwrap();
            assert_eq!(parsed, oid);
            assert_eq!(ObjectId::try_parse(&oid.to_hex()).unwrap(), oid);
        }
    }
}

use crate::artifacts::core::error::SourceError;
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::Write;

/// Fixed 12-byte index file header.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub(crate) marker: String,
    pub(crate) version: u32,
    pub(crate) entries_count: u32,
}

impl IndexHeader {
    pub(crate) fn empty() -> Self {
        IndexHeader {
            marker: String::from(SIGNATURE),
            version: VERSION,
            entries_count: 0,
        }
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.write_all(self.marker.as_bytes())?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SourceError::corrupt_index("truncated header").into());
        }

        let marker = String::from_utf8(bytes[0..4].to_vec())
            .map_err(|_| SourceError::corrupt_index("invalid signature"))?;
        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        let entries_count = byteorder::NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader {
            marker,
            version,
            entries_count,
        })
    }

    /// Reject anything but a well-formed v2 header.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.marker != SIGNATURE {
            return Err(SourceError::corrupt_index(format!(
                "invalid signature '{}'",
                self.marker.escape_default()
            ))
            .into());
        }

        if self.version != VERSION {
            return Err(SourceError::corrupt_index(format!(
                "unsupported version {}",
                self.version
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_round_trip() {
        let header = IndexHeader::new(SIGNATURE.to_string(), VERSION, 42);

        let bytes = header.serialize().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let parsed = IndexHeader::deserialize(&bytes).unwrap();
        assert_eq!(parsed, header);
        parsed.validate().unwrap();
    }

    #[test]
    fn test_rejects_wrong_magic_and_version() {
        let header = IndexHeader::new("JUNK".to_string(), VERSION, 0);
        assert!(header.validate().is_err());

        let header = IndexHeader::new(SIGNATURE.to_string(), 3, 0);
        assert!(header.validate().is_err());
    }
}

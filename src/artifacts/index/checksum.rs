use crate::artifacts::core::error::SourceError;
use crate::artifacts::index::CHECKSUM_SIZE;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Reader that folds everything it reads into a rolling SHA-1.
///
/// The index file ends with the SHA-1 of all preceding bytes; reading
/// through this wrapper lets `verify` compare the trailer against what was
/// actually consumed.
#[derive(Debug)]
pub struct ChecksumReader<R: Read> {
    inner: R,
    digest: Sha1,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        ChecksumReader {
            inner,
            digest: Sha1::new(),
        }
    }

    pub fn read(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut buffer = vec![0; size];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|_| SourceError::corrupt_index("unexpected end-of-file"))?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    /// Consume the 20-byte trailer and compare it with the rolling digest.
    pub fn verify(&mut self) -> anyhow::Result<()> {
        let mut expected = [0u8; CHECKSUM_SIZE];
        self.inner
            .read_exact(&mut expected)
            .map_err(|_| SourceError::corrupt_index("missing checksum trailer"))?;

        let actual = self.digest.clone().finalize();
        if expected != actual.as_slice() {
            return Err(SourceError::corrupt_index("checksum does not match stored value").into());
        }

        Ok(())
    }
}

/// Writer counterpart of `ChecksumReader`.
#[derive(Debug)]
pub struct ChecksumWriter<W: Write> {
    inner: W,
    digest: Sha1,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        ChecksumWriter {
            inner,
            digest: Sha1::new(),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    /// Append the trailer and hand back the underlying writer.
    pub fn finish(mut self) -> anyhow::Result<W> {
        let checksum = self.digest.finalize();
        self.inner.write_all(checksum.as_slice())?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::core::error::as_source_error;
    use std::io::Cursor;

    #[test]
    fn test_write_then_read_verifies() {
        let mut writer = ChecksumWriter::new(Vec::new());
        writer.write(b"index payload").unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = ChecksumReader::new(Cursor::new(bytes));
        reader.read(b"index payload".len()).unwrap();
        reader.verify().unwrap();
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let mut writer = ChecksumWriter::new(Vec::new());
        writer.write(b"index payload").unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes[3] ^= 0xff;

        let mut reader = ChecksumReader::new(Cursor::new(bytes));
        reader.read(b"index payload".len()).unwrap();

        let err = reader.verify().unwrap_err();
        assert!(matches!(
            as_source_error(&err),
            Some(SourceError::CorruptIndex { .. })
        ));
    }
}

use crate::artifacts::core::error::SourceError;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Parse and validate the framed header `<kind> SP <size> NUL`, leaving
    /// the reader positioned at the body.
    ///
    /// The declared size must be plain decimal with no sign and no leading
    /// zeros (a lone `0` is allowed); the kind token must be one of the four
    /// recognized kinds. Violations are `MalformedObject`.
    pub fn parse_header(reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut kind_bytes = Vec::new();
        reader.read_until(b' ', &mut kind_bytes)?;

        if kind_bytes.pop() != Some(b' ') {
            return Err(SourceError::malformed_object("missing space after kind").into());
        }

        let kind = std::str::from_utf8(&kind_bytes)
            .map_err(|_| SourceError::malformed_object("kind is not ascii"))?;
        let object_type = ObjectType::try_from(kind)?;

        let mut size_bytes = Vec::new();
        reader.read_until(b'\0', &mut size_bytes)?;

        if size_bytes.pop() != Some(b'\0') {
            return Err(SourceError::malformed_object("missing NUL after size").into());
        }

        let size_str = std::str::from_utf8(&size_bytes)
            .map_err(|_| SourceError::malformed_object("size is not ascii"))?;

        if size_str.is_empty()
            || !size_str.bytes().all(|b| b.is_ascii_digit())
            || (size_str.len() > 1 && size_str.starts_with('0'))
        {
            return Err(
                SourceError::malformed_object(format!("invalid size field '{}'", size_str)).into(),
            );
        }

        let size = size_str
            .parse::<usize>()
            .map_err(|_| SourceError::malformed_object(format!("size overflow '{}'", size_str)))?;

        Ok((object_type, size))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(SourceError::malformed_object(format!("unrecognized kind '{}'", value)).into()),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parses_valid_header() {
        let mut reader = Cursor::new(b"blob 11\0hello world".to_vec());

        let (object_type, size) = ObjectType::parse_header(&mut reader).unwrap();
        assert_eq!(object_type, ObjectType::Blob);
        assert_eq!(size, 11);
    }

    #[test]
    fn test_parses_zero_size() {
        let mut reader = Cursor::new(b"tree 0\0".to_vec());

        let (object_type, size) = ObjectType::parse_header(&mut reader).unwrap();
        assert_eq!(object_type, ObjectType::Tree);
        assert_eq!(size, 0);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut reader = Cursor::new(b"blub 4\0abcd".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_leading_zero_size() {
        let mut reader = Cursor::new(b"blob 011\0hello world".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_signed_size() {
        let mut reader = Cursor::new(b"blob +11\0hello world".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_missing_nul() {
        let mut reader = Cursor::new(b"blob 11".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }
}

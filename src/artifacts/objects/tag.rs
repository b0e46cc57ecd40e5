//! Annotated tag object
//!
//! An annotated tag wraps another object with a name, a tagger identity and
//! a message. Lightweight tags are plain refs under `refs/tags/` and never
//! reach this type.
//!
//! ## Format
//!
//! ```text
//! tag <size>\0object <digest>
//! type <kind>
//! tag <name>
//! tagger <name> <email> <epoch> <tz>
//!
//! <message>
//! ```
//!
//! Signature verification is out of scope; a trailing PGP block survives
//! inside the message verbatim.

use crate::artifacts::objects::object::{
    DigestCell, Object, Packable, Unpackable, digest_framed, frame,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::person::Person;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Read};

#[derive(Debug, Clone)]
pub struct Tag {
    target_oid: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Person,
    message: String,
    digest: DigestCell,
}

impl Tag {
    pub fn new(
        target_oid: ObjectId,
        target_type: ObjectType,
        name: String,
        tagger: Person,
        message: String,
    ) -> Self {
        Tag {
            target_oid,
            target_type,
            name,
            tagger,
            message,
            digest: DigestCell::new(),
        }
    }

    pub fn target_oid(&self) -> &ObjectId {
        &self.target_oid
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &Person {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn body(&self) -> String {
        let mut lines = vec![
            format!("object {}", self.target_oid),
            format!("type {}", self.target_type),
            format!("tag {}", self.name),
            format!("tagger {}", self.tagger.display()),
            String::new(),
        ];
        lines.push(self.message.clone());

        lines.join("\n")
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.target_oid == other.target_oid
            && self.target_type == other.target_type
            && self.name == other.name
            && self.tagger == other.tagger
            && self.message == other.message
    }
}

impl Eq for Tag {}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(ObjectType::Tag, self.body().as_bytes())
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        let content = String::from_utf8(content).context("tag body is not utf-8")?;
        let mut lines = content.lines();

        let object_line = lines.next().context("tag missing object line")?;
        let target_oid = object_line
            .strip_prefix("object ")
            .context("tag has invalid object line")?;
        let target_oid = ObjectId::try_parse(target_oid)?;

        let type_line = lines.next().context("tag missing type line")?;
        let target_type = type_line
            .strip_prefix("type ")
            .context("tag has invalid type line")?;
        let target_type = ObjectType::try_from(target_type)?;

        let name_line = lines.next().context("tag missing tag line")?;
        let name = name_line
            .strip_prefix("tag ")
            .context("tag has invalid tag line")?
            .to_string();

        let tagger_line = lines.next().context("tag missing tagger line")?;
        let tagger = tagger_line
            .strip_prefix("tagger ")
            .context("tag has invalid tagger line")?;
        let tagger = Person::try_from(tagger)?;

        // skip the blank separator
        lines.next();

        let message = lines.collect::<Vec<&str>>().join("\n");
        Ok(Tag::new(target_oid, target_type, name, tagger, message))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        self.body()
    }

    fn object_id(&self) -> anyhow::Result<ObjectId> {
        self.digest
            .get_or_compute(|| digest_framed(&self.serialize()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::person::parse_epoch_tz;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_serialize_parse_round_trip() {
        let tagger = Person::new_with_timestamp(
            "T".to_string(),
            "t@x".to_string(),
            parse_epoch_tz(1700000000, "+0000").unwrap(),
        );
        let target = ObjectId::try_parse("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let tag = Tag::new(
            target,
            ObjectType::Commit,
            "v1.0".to_string(),
            tagger,
            "first release".to_string(),
        );

        let framed = tag.serialize().unwrap();
        let nul = framed.iter().position(|&b| b == 0).unwrap();
        let parsed = Tag::deserialize(Cursor::new(framed[nul + 1..].to_vec())).unwrap();

        assert_eq!(parsed, tag);
        assert_eq!(parsed.object_id().unwrap(), tag.object_id().unwrap());
    }
}

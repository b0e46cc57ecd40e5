//! Commit object
//!
//! Commits are the nodes of the history DAG. Each one records a tree
//! snapshot, zero or more parent commits, author and committer identities,
//! and a message.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0tree <tree-digest>
//! parent <parent-digest>
//! author <name> <email> <epoch> <tz>
//! committer <name> <email> <epoch> <tz>
//!
//! <message>
//! ```
//!
//! The first parent is the mainline. A commit with no parents is the initial
//! commit; one with two or more is a merge.

use crate::artifacts::objects::object::{
    DigestCell, Object, Packable, Unpackable, digest_framed, frame,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::person::Person;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Read};

/// Snapshot plus metadata plus parent pointers.
#[derive(Debug, Clone)]
pub struct Commit {
    /// Parent commit digests; order is significant, first is the mainline
    parents: Vec<ObjectId>,
    /// Root tree digest
    tree_oid: ObjectId,
    author: Person,
    committer: Person,
    message: String,
    digest: DigestCell,
}

impl Commit {
    /// Create a commit, rejecting duplicate parents.
    pub fn try_new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Person,
        committer: Person,
        message: String,
    ) -> anyhow::Result<Self> {
        for (i, parent) in parents.iter().enumerate() {
            if parents[..i].contains(parent) {
                anyhow::bail!("duplicate parent {}", parent);
            }
        }

        Ok(Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
            digest: DigestCell::new(),
        })
    }

    /// Create a commit whose committer is the author.
    pub fn try_new_authored(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Person,
        message: String,
    ) -> anyhow::Result<Self> {
        let committer = author.clone();
        Self::try_new(parents, tree_oid, author, committer, message)
    }

    /// First line of the commit message, for short-form display.
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// The mainline parent, if any.
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    pub fn author(&self) -> &Person {
        &self.author
    }

    pub fn committer(&self) -> &Person {
        &self.committer
    }

    /// Committer time, the ordering key for history traversal.
    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.timestamp()
    }

    fn body(&self) -> String {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parents {
            lines.push(format!("parent {}", parent));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n")
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.parents == other.parents
            && self.tree_oid == other.tree_oid
            && self.author == other.author
            && self.committer == other.committer
            && self.message == other.message
    }
}

impl Eq for Commit {}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(ObjectType::Commit, self.body().as_bytes())
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        let content = String::from_utf8(content).context("commit body is not utf-8")?;
        let mut lines = content.lines();

        let tree_line = lines.next().context("commit missing tree line")?;
        let tree_oid = tree_line
            .strip_prefix("tree ")
            .context("commit has invalid tree line")?;
        let tree_oid = ObjectId::try_parse(tree_oid)?;

        // Parse all parent lines; there can be zero, one, or several
        let mut parents = Vec::new();
        let mut next_line = lines.next().context("commit missing author line")?;

        while let Some(parent_oid) = next_line.strip_prefix("parent ") {
            parents.push(ObjectId::try_parse(parent_oid)?);
            next_line = lines.next().context("commit missing author line")?;
        }

        let author = next_line
            .strip_prefix("author ")
            .context("commit has invalid author line")?;
        let author = Person::try_from(author)?;

        let committer_line = lines.next().context("commit missing committer line")?;
        let committer = committer_line
            .strip_prefix("committer ")
            .context("commit has invalid committer line")?;
        let committer = Person::try_from(committer)?;

        // skip the blank separator
        lines.next();

        let message = lines.collect::<Vec<&str>>().join("\n");
        Self::try_new(parents, tree_oid, author, committer, message)
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        self.body()
    }

    fn object_id(&self) -> anyhow::Result<ObjectId> {
        self.digest
            .get_or_compute(|| digest_framed(&self.serialize()?))
    }
}

/// Slim commit view for graph algorithms
///
/// Carries only what traversal needs: the digest, the parent digests, and
/// the committer time used as the frontier ordering key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl PartialOrd for SlimCommit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlimCommit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::person::parse_epoch_tz;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::io::Cursor;

    #[fixture]
    fn author() -> Person {
        Person::new_with_timestamp(
            "T".to_string(),
            "t@x".to_string(),
            parse_epoch_tz(1700000000, "+0000").unwrap(),
        )
    }

    #[fixture]
    fn tree_oid() -> ObjectId {
        ObjectId::try_parse("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()
    }

    #[rstest]
    fn test_serialize_parse_round_trip(author: Person, tree_oid: ObjectId) {
        let parent = ObjectId::try_parse("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
        let commit = Commit::try_new_authored(
            vec![parent],
            tree_oid,
            author,
            "one\n\nbody text".to_string(),
        )
        .unwrap();

        let framed = commit.serialize().unwrap();
        let nul = framed.iter().position(|&b| b == 0).unwrap();
        let parsed = Commit::deserialize(Cursor::new(framed[nul + 1..].to_vec())).unwrap();

        assert_eq!(parsed, commit);
        assert_eq!(parsed.object_id().unwrap(), commit.object_id().unwrap());
    }

    #[rstest]
    fn test_rejects_duplicate_parents(author: Person, tree_oid: ObjectId) {
        let parent = ObjectId::try_parse("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();

        let result =
            Commit::try_new_authored(vec![parent, parent], tree_oid, author, "m".to_string());
        assert!(result.is_err());
    }

    #[rstest]
    fn test_merge_commit_parent_order_is_significant(author: Person, tree_oid: ObjectId) {
        let left = ObjectId::try_parse("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
        let right = ObjectId::try_parse("cccccccccccccccccccccccccccccccccccccccc").unwrap();

        let forward =
            Commit::try_new_authored(vec![left, right], tree_oid, author.clone(), "m".to_string())
                .unwrap();
        let reversed =
            Commit::try_new_authored(vec![right, left], tree_oid, author, "m".to_string()).unwrap();

        assert_eq!(forward.first_parent(), Some(&left));
        assert!(forward.is_merge());
        assert_ne!(
            forward.object_id().unwrap(),
            reversed.object_id().unwrap()
        );
    }

    #[rstest]
    fn test_initial_commit_has_no_parents(author: Person, tree_oid: ObjectId) {
        let commit =
            Commit::try_new_authored(Vec::new(), tree_oid, author, "root".to_string()).unwrap();

        assert!(commit.is_initial());
        assert_eq!(commit.first_parent(), None);
    }
}

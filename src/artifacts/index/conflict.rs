//! Conflict records aggregated from index stages
//!
//! During a merge a conflicted path is represented by up to three staged
//! entries (1 = common base, 2 = ours, 3 = theirs) and no stage-0 entry.
//! This module is the read-side view of those stages.

use crate::artifacts::objects::object_id::ObjectId;

/// A three-way conflict for a single path, one slot per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictEntry {
    /// Canonical `/`-separated path
    pub path: String,
    /// Stage 1: common ancestor version, if the path existed there
    pub base: Option<ObjectId>,
    /// Stage 2: our version (HEAD side)
    pub ours: Option<ObjectId>,
    /// Stage 3: their version (merged side)
    pub theirs: Option<ObjectId>,
}

impl ConflictEntry {
    pub fn new(path: String) -> Self {
        ConflictEntry {
            path,
            ..Default::default()
        }
    }

    pub fn set_stage(&mut self, stage: u8, oid: ObjectId) {
        match stage {
            1 => self.base = Some(oid),
            2 => self.ours = Some(oid),
            3 => self.theirs = Some(oid),
            _ => {}
        }
    }

    /// The stages present, as (stage, digest) pairs in stage order.
    pub fn stages(&self) -> Vec<(u8, ObjectId)> {
        [(1, self.base), (2, self.ours), (3, self.theirs)]
            .into_iter()
            .filter_map(|(stage, oid)| oid.map(|oid| (stage, oid)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stages_skip_absent_slots() {
        let oid = ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        let mut conflict = ConflictEntry::new("x".to_string());
        conflict.set_stage(2, oid);
        conflict.set_stage(3, oid);

        assert_eq!(conflict.stages(), vec![(2, oid), (3, oid)]);
        assert_eq!(conflict.base, None);
    }
}

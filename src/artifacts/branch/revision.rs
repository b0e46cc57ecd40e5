//! Revision expressions
//!
//! A revision names a commit: `HEAD`, a branch or tag short name, a full
//! 40-hex digest, or an abbreviated digest prefix, optionally followed by
//! history operators: `~N` for the Nth first-parent ancestor and `^N` for
//! the Nth parent (both default to 1).

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::branch::ref_name::RefName;
use crate::artifacts::core::error::{SourceError, as_source_error};
use crate::artifacts::objects::object_id::{OBJECT_ID_HEX_LENGTH, ObjectId};
use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RevOp {
    /// `~N`: follow the first parent N times
    Ancestor(usize),
    /// `^N`: take the Nth parent (1-indexed)
    Parent(usize),
}

/// Parsed revision expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    base: String,
    ops: Vec<RevOp>,
}

impl Revision {
    pub fn try_parse(expr: &str) -> anyhow::Result<Self> {
        let split = expr
            .find(['~', '^'])
            .unwrap_or(expr.len());
        let (base, mut rest) = expr.split_at(split);

        if base.is_empty() {
            anyhow::bail!("empty revision expression '{}'", expr);
        }

        let mut ops = Vec::new();
        while !rest.is_empty() {
            let op_char = rest.as_bytes()[0];
            rest = &rest[1..];

            let digits_end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let (digits, remaining) = rest.split_at(digits_end);
            rest = remaining;

            let count = if digits.is_empty() {
                1
            } else {
                digits
                    .parse::<usize>()
                    .with_context(|| format!("invalid revision operator count in '{}'", expr))?
            };

            match op_char {
                b'~' => ops.push(RevOp::Ancestor(count)),
                b'^' => ops.push(RevOp::Parent(count)),
                _ => unreachable!("split only at ~ and ^"),
            }
        }

        Ok(Revision {
            base: base.to_string(),
            ops,
        })
    }

    /// Resolve to a commit digest against the refs and object store.
    pub fn resolve(&self, database: &Database, refs: &Refs) -> anyhow::Result<ObjectId> {
        let mut oid = self.resolve_base(database, refs)?;

        for op in &self.ops {
            match op {
                RevOp::Ancestor(count) => {
                    for _ in 0..*count {
                        let commit = database.load_commit(&oid)?;
                        oid = *commit.first_parent().ok_or_else(|| {
                            anyhow::anyhow!("revision '{}' runs out of history", self.base)
                        })?;
                    }
                }
                RevOp::Parent(n) => {
                    // `^0` names the commit itself
                    if *n == 0 {
                        continue;
                    }
                    let commit = database.load_commit(&oid)?;
                    oid = *commit.parents().get(n - 1).ok_or_else(|| {
                        anyhow::anyhow!("commit {} has no parent #{}", oid.to_short(), n)
                    })?;
                }
            }
        }

        Ok(oid)
    }

    fn resolve_base(&self, database: &Database, refs: &Refs) -> anyhow::Result<ObjectId> {
        if self.base == "HEAD" {
            return refs.resolve(&RefName::head());
        }

        // refs win over digests: branch, then tag, then a literal ref path
        for candidate in [
            RefName::branch(&self.base),
            RefName::tag(&self.base),
            RefName::try_parse(&self.base),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(oid) = refs.resolve_optional(&candidate)? {
                return Ok(oid);
            }
        }

        if self.base.len() == OBJECT_ID_HEX_LENGTH
            && let Ok(oid) = ObjectId::try_parse(&self.base)
        {
            return Ok(oid);
        }

        database.resolve_prefix(&self.base).map_err(|err| {
            if matches!(as_source_error(&err), Some(SourceError::UnknownDigest { .. })) {
                SourceError::RefNotFound {
                    name: self.base.clone(),
                }
                .into()
            } else {
                err
            }
        })
    }
}

//! Line-level three-way content merge
//!
//! Given base, ours, and theirs contents, produces a merged document:
//! regions where only one side diverged from the base take that side's
//! lines, regions where both sides agree take either, and regions where
//! the sides diverge from each other become conflict sections bracketed by
//! markers, so context lines stay outside the markers and only the truly
//! contested lines sit inside.
//!
//! The alignment comes from two Myers diffs (base→ours and base→theirs):
//! base lines matched on both sides anchor the walk, and the spans between
//! anchors form the chunks to be resolved.

use crate::artifacts::diff::hunk::split_lines;
use crate::artifacts::diff::myers::{Edit, MyersDiff};
use crate::artifacts::merge::markers::conflict_markers;
use bytes::Bytes;
use std::collections::HashMap;

/// Result of a content-level merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedContent {
    pub content: Bytes,
    /// False when any conflict section was emitted
    pub clean: bool,
}

/// Merge two derived documents against their common base.
pub fn merge_contents(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    ours_label: &str,
    theirs_label: &str,
    diff3_style: bool,
) -> MergedContent {
    let base_lines = split_lines(base);
    let our_lines = split_lines(ours);
    let their_lines = split_lines(theirs);

    let walk = Diff3Walk {
        base: &base_lines,
        ours: &our_lines,
        theirs: &their_lines,
        match_ours: match_map(&base_lines, &our_lines),
        match_theirs: match_map(&base_lines, &their_lines),
        ours_label,
        theirs_label,
        diff3_style,
    };

    walk.run()
}

/// Base line number → side line number, from the Equal edits of a Myers
/// diff (1-indexed both sides).
fn match_map(base: &[String], side: &[String]) -> HashMap<usize, usize> {
    MyersDiff::new(base, side)
        .diff()
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Equal { line_a, line_b } => Some((line_a.number, line_b.number)),
            _ => None,
        })
        .collect()
}

struct Diff3Walk<'d> {
    base: &'d [String],
    ours: &'d [String],
    theirs: &'d [String],
    match_ours: HashMap<usize, usize>,
    match_theirs: HashMap<usize, usize>,
    ours_label: &'d str,
    theirs_label: &'d str,
    diff3_style: bool,
}

impl Diff3Walk<'_> {
    fn run(self) -> MergedContent {
        // cursors are counts of consumed lines (so +1 is the next line,
        // 1-indexed)
        let mut at_base = 0usize;
        let mut at_ours = 0usize;
        let mut at_theirs = 0usize;

        let mut output = Vec::new();
        let mut clean = true;

        loop {
            match self.next_mismatch(at_base, at_ours, at_theirs) {
                // aligned at the very next line: scan for the next anchor
                // and emit the divergent span before it
                Some(1) => match self.next_anchor(at_base) {
                    Some((base_to, ours_to, theirs_to)) => {
                        clean &= self.emit(
                            &mut output,
                            (at_base, base_to - 1),
                            (at_ours, ours_to - 1),
                            (at_theirs, theirs_to - 1),
                        );
                        (at_base, at_ours, at_theirs) = (base_to - 1, ours_to - 1, theirs_to - 1);
                    }
                    None => {
                        clean &= self.emit_tail(&mut output, at_base, at_ours, at_theirs);
                        break;
                    }
                },
                // i-1 leading lines agree on all three: emit them as-is
                Some(i) => {
                    clean &= self.emit(
                        &mut output,
                        (at_base, at_base + i - 1),
                        (at_ours, at_ours + i - 1),
                        (at_theirs, at_theirs + i - 1),
                    );
                    at_base += i - 1;
                    at_ours += i - 1;
                    at_theirs += i - 1;
                }
                None => {
                    clean &= self.emit_tail(&mut output, at_base, at_ours, at_theirs);
                    break;
                }
            }
        }

        MergedContent {
            content: Bytes::from(output),
            clean,
        }
    }

    /// Smallest offset i (from the cursors) where the three documents stop
    /// agreeing, or None when every remaining line agrees.
    fn next_mismatch(&self, at_base: usize, at_ours: usize, at_theirs: usize) -> Option<usize> {
        let in_bounds = |i: usize| {
            at_base + i <= self.base.len()
                || at_ours + i <= self.ours.len()
                || at_theirs + i <= self.theirs.len()
        };
        let aligned = |map: &HashMap<usize, usize>, offset: usize, i: usize| {
            map.get(&(at_base + i)) == Some(&(offset + i))
        };

        let mut i = 1;
        while in_bounds(i)
            && aligned(&self.match_ours, at_ours, i)
            && aligned(&self.match_theirs, at_theirs, i)
        {
            i += 1;
        }

        in_bounds(i).then_some(i)
    }

    /// Next base line (after the cursor) matched on both sides, with the
    /// corresponding side line numbers.
    fn next_anchor(&self, at_base: usize) -> Option<(usize, usize, usize)> {
        let mut base_line = at_base + 1;
        while base_line <= self.base.len() {
            if let (Some(&ours_line), Some(&theirs_line)) = (
                self.match_ours.get(&base_line),
                self.match_theirs.get(&base_line),
            ) {
                return Some((base_line, ours_line, theirs_line));
            }
            base_line += 1;
        }
        None
    }

    fn emit_tail(
        &self,
        output: &mut Vec<u8>,
        at_base: usize,
        at_ours: usize,
        at_theirs: usize,
    ) -> bool {
        self.emit(
            output,
            (at_base, self.base.len()),
            (at_ours, self.ours.len()),
            (at_theirs, self.theirs.len()),
        )
    }

    /// Write one chunk given half-open consumed ranges per document.
    /// Returns false when the chunk is a conflict.
    fn emit(
        &self,
        output: &mut Vec<u8>,
        base_span: (usize, usize),
        ours_span: (usize, usize),
        theirs_span: (usize, usize),
    ) -> bool {
        let base = &self.base[base_span.0..base_span.1];
        let ours = &self.ours[ours_span.0..ours_span.1];
        let theirs = &self.theirs[theirs_span.0..theirs_span.1];

        if ours == base || ours == theirs {
            push_lines(output, theirs);
            return true;
        }
        if theirs == base {
            push_lines(output, ours);
            return true;
        }

        // both sides rewrote the span differently
        let section = conflict_markers(
            &flatten(base),
            &flatten(ours),
            &flatten(theirs),
            self.ours_label,
            self.theirs_label,
            self.diff3_style,
        );
        output.extend_from_slice(&section);
        false
    }
}

fn flatten(lines: &[String]) -> Vec<u8> {
    let mut bytes = Vec::new();
    push_lines(&mut bytes, lines);
    bytes
}

fn push_lines(output: &mut Vec<u8>, lines: &[String]) {
    for line in lines {
        output.extend_from_slice(line.as_bytes());
        output.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn merge(base: &str, ours: &str, theirs: &str) -> MergedContent {
        merge_contents(
            base.as_bytes(),
            ours.as_bytes(),
            theirs.as_bytes(),
            "ours",
            "theirs",
            false,
        )
    }

    #[rstest]
    fn test_non_overlapping_edits_merge_cleanly() {
        let result = merge("a\nb\nc\nd\n", "A\nb\nc\nd\n", "a\nb\nc\nD\n");

        assert!(result.clean);
        assert_eq!(&result.content[..], b"A\nb\nc\nD\n");
    }

    #[rstest]
    fn test_conflicting_middle_keeps_context_outside_markers() {
        let result = merge("a\nb\nc\n", "a\nB1\nc\n", "a\nB2\nc\n");

        assert!(!result.clean);
        assert_eq!(
            &result.content[..],
            b"a\n<<<<<<< ours\nB1\n=======\nB2\n>>>>>>> theirs\nc\n"
        );
    }

    #[rstest]
    fn test_identical_sides_are_clean() {
        let result = merge("x\n", "y\n", "y\n");

        assert!(result.clean);
        assert_eq!(&result.content[..], b"y\n");
    }

    #[rstest]
    fn test_one_side_unchanged_takes_the_other() {
        let result = merge("a\nb\n", "a\nb\n", "a\nb\nc\n");
        assert!(result.clean);
        assert_eq!(&result.content[..], b"a\nb\nc\n");

        let result = merge("a\nb\n", "z\nb\n", "a\nb\n");
        assert!(result.clean);
        assert_eq!(&result.content[..], b"z\nb\n");
    }

    #[rstest]
    fn test_conflict_at_end_of_file() {
        let result = merge("a\nend\n", "a\nours-end\n", "a\ntheirs-end\n");

        assert!(!result.clean);
        assert_eq!(
            &result.content[..],
            b"a\n<<<<<<< ours\nours-end\n=======\ntheirs-end\n>>>>>>> theirs\n"
        );
    }

    #[rstest]
    fn test_diff3_style_shows_base_section() {
        let result = merge_contents(
            b"a\nb\nc\n",
            b"a\nB1\nc\n",
            b"a\nB2\nc\n",
            "ours",
            "theirs",
            true,
        );

        assert!(!result.clean);
        assert_eq!(
            &result.content[..],
            b"a\n<<<<<<< ours\nB1\n||||||| base\nb\n=======\nB2\n>>>>>>> theirs\nc\n"
        );
    }

    #[rstest]
    fn test_both_empty_sides() {
        let result = merge("gone\n", "", "");

        assert!(result.clean);
        assert_eq!(&result.content[..], b"");
    }
}

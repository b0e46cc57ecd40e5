//! Unified hunks over a line-diff edit script
//!
//! Groups the changed runs of an edit script into hunks with surrounding
//! context, in the standard unified form:
//!
//! ```text
//! @@ -<oldStart>,<oldCount> +<newStart>,<newCount> @@
//!  context
//! -deleted
//! +added
//! ```
//!
//! Line numbers are 1-indexed; a side with zero lines reports the line
//! *before* the hunk as its start. Two changed runs separated by fewer than
//! `2 * context` equal lines share one hunk.

use crate::artifacts::diff::myers::{Edit, MyersDiff};

/// Default number of context lines around a change.
pub const DEFAULT_CONTEXT: usize = 3;

/// Binary classification probe size: a NUL in the first 8 KiB of either
/// side marks the pair as binary.
const BINARY_PROBE_SIZE: usize = 8 * 1024;

/// One unified hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    a_start: usize,
    b_start: usize,
    edits: Vec<Edit<String>>,
}

impl Hunk {
    pub fn a_start(&self) -> usize {
        self.a_start
    }

    pub fn b_start(&self) -> usize {
        self.b_start
    }

    pub fn edits(&self) -> &[Edit<String>] {
        &self.edits
    }

    pub fn a_count(&self) -> usize {
        self.edits.iter().filter(|edit| edit.consumes_a()).count()
    }

    pub fn b_count(&self) -> usize {
        self.edits.iter().filter(|edit| edit.consumes_b()).count()
    }

    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.a_start,
            self.a_count(),
            self.b_start,
            self.b_count()
        )
    }

    /// Header plus body lines.
    pub fn format(&self) -> String {
        let mut lines = vec![self.header()];
        for edit in &self.edits {
            lines.push(edit.as_string());
        }
        lines.join("\n")
    }
}

/// Result of diffing two byte contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDiff {
    /// One or both sides are binary; no hunks are produced
    Binary,
    /// Line hunks, empty when the sides are identical
    Text(Vec<Hunk>),
}

impl FileDiff {
    pub fn is_empty(&self) -> bool {
        matches!(self, FileDiff::Text(hunks) if hunks.is_empty())
    }
}

/// Classify content as binary: any NUL in the first 8 KiB.
pub fn is_binary(data: &[u8]) -> bool {
    data[..data.len().min(BINARY_PROBE_SIZE)].contains(&0)
}

/// Split content into lines: `\r\n` folds to `\n`, and the empty trailing
/// line after a final newline is suppressed.
pub fn split_lines(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data).replace("\r\n", "\n");

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Diff two byte contents into unified hunks.
pub fn diff_contents(old: &[u8], new: &[u8], context: usize) -> FileDiff {
    if is_binary(old) || is_binary(new) {
        if old == new {
            return FileDiff::Text(Vec::new());
        }
        return FileDiff::Binary;
    }

    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let edits = MyersDiff::new(&old_lines, &new_lines).diff();
    FileDiff::Text(build_hunks(&edits, context))
}

/// Group an edit script into hunks with `context` lines of surrounding
/// context, merging runs separated by fewer than `2 * context` equal lines.
pub fn build_hunks(edits: &[Edit<String>], context: usize) -> Vec<Hunk> {
    let changed: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter_map(|(i, edit)| edit.is_change().then_some(i))
        .collect();

    if changed.is_empty() {
        return Vec::new();
    }

    // group changed indices into spans that share a hunk
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for &index in &changed {
        match spans.last_mut() {
            Some((_, end)) if index - *end <= 2 * context => *end = index,
            _ => spans.push((index, index)),
        }
    }

    spans
        .into_iter()
        .map(|(first, last)| {
            let start = first.saturating_sub(context);
            let end = (last + context).min(edits.len() - 1);
            let hunk_edits: Vec<Edit<String>> = edits[start..=end].to_vec();

            // lines are consecutive from 1, so the count of a-consuming
            // edits before the span is also the last a-line number seen
            let a_before = edits[..start].iter().filter(|e| e.consumes_a()).count();
            let b_before = edits[..start].iter().filter(|e| e.consumes_b()).count();

            let a_count = hunk_edits.iter().filter(|e| e.consumes_a()).count();
            let b_count = hunk_edits.iter().filter(|e| e.consumes_b()).count();

            Hunk {
                a_start: if a_count > 0 { a_before + 1 } else { a_before },
                b_start: if b_count > 0 { b_before + 1 } else { b_before },
                edits: hunk_edits,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn lines(count: usize, prefix: &str) -> String {
        (1..=count)
            .map(|i| format!("{}{}\n", prefix, i))
            .collect()
    }

    #[rstest]
    fn test_identical_contents_produce_no_hunks() {
        let content = b"a\nb\nc\n";
        assert_eq!(
            diff_contents(content, content, DEFAULT_CONTEXT),
            FileDiff::Text(Vec::new())
        );
    }

    #[rstest]
    fn test_single_change_with_context() {
        let old = lines(7, "line");
        let new = old.replace("line4\n", "changed\n");

        let FileDiff::Text(hunks) = diff_contents(old.as_bytes(), new.as_bytes(), 3) else {
            panic!("expected text diff");
        };

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -1,7 +1,7 @@");
        assert_eq!(
            hunks[0].format(),
            "@@ -1,7 +1,7 @@\n line1\n line2\n line3\n-line4\n+changed\n line5\n line6\n line7"
        );
    }

    #[rstest]
    fn test_distant_changes_split_into_hunks() {
        let old = lines(20, "l");
        let new = old.replace("l2\n", "x2\n").replace("l18\n", "x18\n");

        let FileDiff::Text(hunks) = diff_contents(old.as_bytes(), new.as_bytes(), 3) else {
            panic!("expected text diff");
        };

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].header(), "@@ -1,5 +1,5 @@");
        assert_eq!(hunks[1].header(), "@@ -15,6 +15,6 @@");
    }

    #[rstest]
    fn test_near_changes_merge_into_one_hunk() {
        let old = lines(12, "l");
        // gap of 5 equal lines < 2*3, so one hunk
        let new = old.replace("l3\n", "x3\n").replace("l9\n", "x9\n");

        let FileDiff::Text(hunks) = diff_contents(old.as_bytes(), new.as_bytes(), 3) else {
            panic!("expected text diff");
        };

        assert_eq!(hunks.len(), 1);
    }

    #[rstest]
    fn test_pure_insertion_reports_zero_count_side() {
        let old = b"";
        let new = b"a\nb\n";

        let FileDiff::Text(hunks) = diff_contents(old, new, 3) else {
            panic!("expected text diff");
        };

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -0,0 +1,2 @@");
    }

    #[rstest]
    fn test_deletion_at_end() {
        let old = b"a\nb\nc\n";
        let new = b"a\nb\n";

        let FileDiff::Text(hunks) = diff_contents(old, new, 1) else {
            panic!("expected text diff");
        };

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -2,2 +2,1 @@");
    }

    #[rstest]
    fn test_binary_detection() {
        assert!(is_binary(b"abc\0def"));
        assert!(!is_binary(b"plain text\n"));

        assert_eq!(
            diff_contents(b"abc\0", b"text\n", DEFAULT_CONTEXT),
            FileDiff::Binary
        );
        assert!(diff_contents(b"abc\0", b"abc\0", DEFAULT_CONTEXT).is_empty());
    }

    #[rstest]
    fn test_crlf_folds_to_lf() {
        let old = b"a\r\nb\r\n";
        let new = b"a\nb\n";

        assert!(diff_contents(old, new, DEFAULT_CONTEXT).is_empty());
    }
}

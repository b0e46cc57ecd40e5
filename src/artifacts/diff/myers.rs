//! Myers shortest-edit-script diff
//!
//! Computes an edit script between two sequences: the classic greedy
//! forward algorithm records a trace of furthest-reaching x positions per
//! diagonal, then backtracks to recover the path. Applying the script's
//! deletions and insertions to the old sequence reproduces the new one.

use derive_new::new;

/// A sequence element with its 1-indexed position.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Line<T> {
    pub number: usize,
    pub value: T,
}

/// One step of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<T> {
    Delete { line: Line<T> },
    Insert { line: Line<T> },
    Equal { line_a: Line<T>, line_b: Line<T> },
}

impl<T> Edit<T> {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }

    /// Whether this edit consumes a line of the old side.
    pub fn consumes_a(&self) -> bool {
        matches!(self, Edit::Delete { .. } | Edit::Equal { .. })
    }

    /// Whether this edit consumes a line of the new side.
    pub fn consumes_b(&self) -> bool {
        matches!(self, Edit::Insert { .. } | Edit::Equal { .. })
    }
}

impl<T: Clone + Into<String>> Edit<T> {
    /// The unified-diff rendering: prefix ` `, `-`, or `+`.
    pub fn as_string(&self) -> String {
        match self {
            Edit::Delete { line } => format!("-{}", line.value.clone().into()),
            Edit::Insert { line } => format!("+{}", line.value.clone().into()),
            Edit::Equal { line_a, .. } => format!(" {}", line_a.value.clone().into()),
        }
    }
}

/// Shortest-edit-script diff between two sequences.
#[derive(Debug, Clone)]
pub struct MyersDiff<T> {
    a: Vec<Line<T>>,
    b: Vec<Line<T>>,
}

impl<T: Eq + Clone> MyersDiff<T> {
    pub fn new(a: &[T], b: &[T]) -> Self {
        MyersDiff {
            a: Self::number_lines(a),
            b: Self::number_lines(b),
        }
    }

    fn number_lines(document: &[T]) -> Vec<Line<T>> {
        document
            .iter()
            .enumerate()
            .map(|(i, value)| Line::new(i + 1, value.clone()))
            .collect()
    }

    /// The edit script, in old-file order.
    pub fn diff(&self) -> Vec<Edit<T>> {
        if self.a.is_empty() && self.b.is_empty() {
            return Vec::new();
        }

        let mut edits = Vec::new();

        for (prev_x, prev_y, x, y) in self.backtrack() {
            if x == prev_x {
                // only y advanced: insertion
                if prev_y < self.b.len() as isize {
                    edits.push(Edit::Insert {
                        line: self.b[prev_y as usize].clone(),
                    });
                }
            } else if y == prev_y {
                // only x advanced: deletion
                if prev_x < self.a.len() as isize {
                    edits.push(Edit::Delete {
                        line: self.a[prev_x as usize].clone(),
                    });
                }
            } else if prev_x < self.a.len() as isize {
                // diagonal move: lines match
                edits.push(Edit::Equal {
                    line_a: self.a[prev_x as usize].clone(),
                    line_b: self.b[prev_y as usize].clone(),
                });
            }
        }

        edits.reverse();
        edits
    }

    /// Forward pass: furthest-reaching x per diagonal k, one snapshot per
    /// edit distance d.
    fn shortest_edit_trace(&self) -> Vec<Vec<isize>> {
        let (n, m) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (n + m) as usize;

        let mut v = vec![0isize; 2 * offset + 1];
        let mut trace = Vec::new();

        for d in 0..=(n + m) {
            trace.push(v.clone());

            for k in (-d..=d).step_by(2) {
                let idx = (offset as isize + k) as usize;

                let mut x = if k == -d {
                    // only reachable from k+1: insertion
                    v[idx + 1]
                } else if k == d {
                    // only reachable from k-1: deletion
                    v[idx - 1] + 1
                } else {
                    // take whichever neighbor reaches further
                    let x_del = v[idx - 1] + 1;
                    let x_ins = v[idx + 1];
                    x_del.max(x_ins)
                };

                let mut y = x - k;
                while x < n && y < m && self.a[x as usize].value == self.b[y as usize].value {
                    // ride the snake
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return trace;
                }
            }
        }

        trace
    }

    /// Backward pass over the trace, yielding moves newest-first.
    fn backtrack(&self) -> Vec<(isize, isize, isize, isize)> {
        let (mut x, mut y) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (x + y) as usize;
        let mut path = Vec::new();

        let trace = self.shortest_edit_trace();

        for (d, v) in trace.iter().enumerate().rev() {
            let k = x - y;

            let prev_k = if k == -(d as isize) {
                k + 1
            } else if k == (d as isize) {
                k - 1
            } else {
                let k_del = k - 1;
                let k_ins = k + 1;
                if v[(offset as isize + k_del) as usize] + 1
                    > v[(offset as isize + k_ins) as usize]
                {
                    k_del
                } else {
                    k_ins
                }
            };

            let prev_x = v[(offset as isize + prev_k) as usize];
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                path.push((x - 1, y - 1, x, y));
                x -= 1;
                y -= 1;
            }

            if d > 0 {
                path.push((prev_x, prev_y, x, y));
            }

            (x, y) = (prev_x, prev_y);
        }

        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;
    use rstest::rstest;

    /// Replay an edit script: deletions drop old lines, everything else
    /// must reproduce the new sequence.
    fn apply<T: Clone>(edits: &[Edit<T>]) -> Vec<T> {
        let mut result = Vec::new();
        for edit in edits {
            match edit {
                Edit::Delete { .. } => {}
                Edit::Insert { line } => result.push(line.value.clone()),
                Edit::Equal { line_a, .. } => result.push(line_a.value.clone()),
            }
        }
        result
    }

    #[rstest]
    fn test_identical_sequences_have_no_changes() {
        let lines = vec!["a", "b", "c"];
        let edits = MyersDiff::new(&lines, &lines).diff();

        assert!(edits.iter().all(|edit| !edit.is_change()));
        assert_eq!(edits.len(), 3);
    }

    #[rstest]
    fn test_classic_myers_example() {
        let a: Vec<char> = "abcabba".chars().collect();
        let b: Vec<char> = "cbabac".chars().collect();

        let edits = MyersDiff::new(&a, &b).diff();

        let distance = edits.iter().filter(|edit| edit.is_change()).count();
        assert_eq!(distance, 5);
        assert_eq!(apply(&edits), b);
    }

    #[rstest]
    fn test_line_numbers_are_one_indexed() {
        let a = vec!["old"];
        let b = vec!["new"];

        let edits = MyersDiff::new(&a, &b).diff();

        match &edits[..] {
            [Edit::Delete { line: del }, Edit::Insert { line: ins }] => {
                assert_eq!(del.number, 1);
                assert_eq!(ins.number, 1);
            }
            other => panic!("unexpected script: {:?}", other),
        }
    }

    #[rstest]
    fn test_empty_sequences_have_empty_script() {
        let empty: Vec<&str> = Vec::new();
        assert!(MyersDiff::new(&empty, &empty).diff().is_empty());
    }

    #[rstest]
    fn test_pure_insertion_and_deletion() {
        let empty: Vec<&str> = Vec::new();
        let lines = vec!["x", "y"];

        let inserts = MyersDiff::new(&empty, &lines).diff();
        assert!(inserts.iter().all(|e| matches!(e, Edit::Insert { .. })));

        let deletes = MyersDiff::new(&lines, &empty).diff();
        assert!(deletes.iter().all(|e| matches!(e, Edit::Delete { .. })));
    }

    proptest! {
        #[test]
        fn test_edit_script_composes(
            a in proptest::collection::vec("[ab]{0,3}", 0..8),
            b in proptest::collection::vec("[ab]{0,3}", 0..8)
        ) {
            let edits = MyersDiff::new(&a, &b).diff();
            assert_eq!(apply(&edits), b);
        }
    }
}

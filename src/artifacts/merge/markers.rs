//! Conflict marker materialization
//!
//! A conflicted file interleaves the ours and theirs contents (plus the
//! base, in diff3 style) between textual brackets:
//!
//! ```text
//! <<<<<<< <ours_label>
//! ...ours lines...
//! ||||||| base           (diff3 style only)
//! ...base lines...
//! =======
//! ...theirs lines...
//! >>>>>>> <theirs_label>
//! ```

use bytes::Bytes;

/// Marks the beginning of the "ours" section
pub const MARKER_OURS: &str = "<<<<<<<";

/// Marks the beginning of the "base" section (diff3 style)
pub const MARKER_BASE: &str = "|||||||";

/// Separates "ours" from "theirs"
pub const MARKER_SEPARATOR: &str = "=======";

/// Marks the end of the "theirs" section
pub const MARKER_THEIRS: &str = ">>>>>>>";

/// Build a conflicted file from the three versions.
///
/// Each section is newline-terminated even when its content is not, so the
/// markers always sit on their own lines.
pub fn conflict_markers(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    ours_label: &str,
    theirs_label: &str,
    diff3: bool,
) -> Bytes {
    let mut result = Vec::new();

    result.extend_from_slice(format!("{} {}\n", MARKER_OURS, ours_label).as_bytes());
    push_section(&mut result, ours);

    if diff3 && !base.is_empty() {
        result.extend_from_slice(format!("{} base\n", MARKER_BASE).as_bytes());
        push_section(&mut result, base);
    }

    result.extend_from_slice(format!("{}\n", MARKER_SEPARATOR).as_bytes());
    push_section(&mut result, theirs);
    result.extend_from_slice(format!("{} {}\n", MARKER_THEIRS, theirs_label).as_bytes());

    Bytes::from(result)
}

fn push_section(result: &mut Vec<u8>, content: &[u8]) {
    result.extend_from_slice(content);
    if !content.is_empty() && !content.ends_with(b"\n") {
        result.push(b'\n');
    }
}

/// Whether content still contains unresolved conflict markers.
pub fn has_conflict_markers(content: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content);
    text.lines().any(|line| {
        line.starts_with(MARKER_OURS)
            || line.starts_with(MARKER_SEPARATOR)
            || line.starts_with(MARKER_THEIRS)
    })
}

//! Line-level comparison of two document versions, for display.
//!
//! Uses the `similar` crate (Myers diff algorithm) to produce structured
//! hunks with context lines. This is deliberately coarser than the
//! character-level [`diff`](crate::diff) used for storage.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// Lines of context kept around each change in [`DiffResult::hunks`].
const CONTEXT_LINES: usize = 3;

/// The result of comparing two versions of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Lines present only in the new version, in order.
    pub additions: Vec<String>,
    /// Lines present only in the old version, in order.
    pub deletions: Vec<String>,
    /// Number of changed lines (`additions + deletions`).
    pub change_count: usize,
    /// The changes grouped into hunks with surrounding context.
    pub hunks: Vec<DiffHunk>,
}

impl DiffResult {
    /// Returns `true` if the two versions are identical.
    pub fn is_empty(&self) -> bool {
        self.change_count == 0
    }
}

/// A contiguous region of changes in a diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Line number in the old content where this hunk starts (1-based).
    pub old_start: usize,
    /// Number of lines from the old content in this hunk.
    pub old_count: usize,
    /// Line number in the new content where this hunk starts (1-based).
    pub new_start: usize,
    /// Number of lines from the new content in this hunk.
    pub new_count: usize,
    /// The individual diff lines in this hunk.
    pub lines: Vec<DiffLine>,
}

/// A single line in a diff hunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffLine {
    /// A line present in both old and new (context).
    Context(String),
    /// A line added in the new content.
    Added(String),
    /// A line removed from the old content.
    Removed(String),
}

/// Compare two texts line by line.
pub fn compare_lines(old: &str, new: &str) -> DiffResult {
    if old == new {
        return DiffResult::default();
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut result = DiffResult::default();

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let mut hunk = DiffHunk {
            old_start: first.old_range().start + 1,
            old_count: last.old_range().end - first.old_range().start,
            new_start: first.new_range().start + 1,
            new_count: last.new_range().end - first.new_range().start,
            lines: Vec::new(),
        };

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let text = change.value().trim_end_matches(['\n', '\r']).to_string();
                match change.tag() {
                    ChangeTag::Equal => hunk.lines.push(DiffLine::Context(text)),
                    ChangeTag::Delete => {
                        result.deletions.push(text.clone());
                        hunk.lines.push(DiffLine::Removed(text));
                    }
                    ChangeTag::Insert => {
                        result.additions.push(text.clone());
                        hunk.lines.push(DiffLine::Added(text));
                    }
                }
            }
        }

        result.hunks.push(hunk);
    }

    result.change_count = result.additions.len() + result.deletions.len();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_have_no_changes() {
        let result = compare_lines("hello\nworld\n", "hello\nworld\n");
        assert!(result.is_empty());
        assert!(result.hunks.is_empty());
    }

    #[test]
    fn single_line_modification() {
        let result = compare_lines("This is version one.\n", "This is version two.\n");
        assert_eq!(result.deletions, vec!["This is version one."]);
        assert_eq!(result.additions, vec!["This is version two."]);
        assert_eq!(result.change_count, 2);
    }

    #[test]
    fn addition_only() {
        let result = compare_lines("line1\nline2\n", "line1\nline2\nline3\n");
        assert_eq!(result.additions, vec!["line3"]);
        assert!(result.deletions.is_empty());
    }

    #[test]
    fn empty_to_content_and_back() {
        let added = compare_lines("", "new content\n");
        assert_eq!(added.additions.len(), 1);
        let removed = compare_lines("old content\n", "");
        assert_eq!(removed.deletions.len(), 1);
    }

    #[test]
    fn hunks_carry_context_and_line_numbers() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\n";
        let new = "a\nb\nc\nd\nX\nf\ng\nh\ni\nj\n";
        let result = compare_lines(old, new);

        assert_eq!(result.hunks.len(), 1);
        let hunk = &result.hunks[0];
        assert_eq!(hunk.old_start, 2);
        assert_eq!(hunk.new_start, 2);
        assert!(hunk.lines.iter().any(|l| matches!(l, DiffLine::Context(_))));
        assert!(hunk.lines.contains(&DiffLine::Removed("e".into())));
        assert!(hunk.lines.contains(&DiffLine::Added("X".into())));
    }

    #[test]
    fn distant_changes_form_separate_hunks() {
        let old: String = (0..30).map(|i| format!("{i}\n")).collect();
        let new: String = (0..30)
            .map(|i| match i {
                2 => "two\n".to_string(),
                27 => "twenty-seven\n".to_string(),
                _ => format!("{i}\n"),
            })
            .collect();
        let result = compare_lines(&old, &new);
        assert_eq!(result.hunks.len(), 2);
        assert_eq!(result.change_count, 4);
    }
}

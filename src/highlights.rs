//! Highlight data structures
//!
//! Defines the per-line span map produced by the parsing engine and the
//! version tag used by the client to detect stale results.

use std::collections::BTreeMap;

use crate::protocol::Edit;

/// A single highlighted span within a line.
///
/// Columns are character indices within the line (tree-sitter reports byte
/// columns; the engine converts them before building spans).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Start column (0-indexed, inclusive)
    pub start_col: usize,
    /// End column (exclusive)
    pub end_col: usize,
    /// Capture group name, e.g. `keyword`, `string`, `function.method`
    pub group: String,
}

/// Highlight information for a single line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineHighlights {
    /// Spans sorted by start column
    pub spans: Vec<HighlightSpan>,
    /// Spans that were superseded by a more specific capture on the same
    /// syntax node (kept so callers can inspect what was overridden)
    pub dropped: Vec<HighlightSpan>,
}

impl LineHighlights {
    /// Get the group at a given column, if any
    pub fn group_at(&self, col: usize) -> Option<&str> {
        for span in &self.spans {
            if col >= span.start_col && col < span.end_col {
                return Some(&span.group);
            }
        }
        None
    }
}

/// Complete highlight state for a buffer, tagged with the buffer version
/// it was computed against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxHighlights {
    /// Map of line number (0-indexed) to spans on that line
    pub lines: BTreeMap<usize, LineHighlights>,
    /// Buffer version this corresponds to
    pub version: u64,
}

impl SyntaxHighlights {
    pub fn new(version: u64) -> Self {
        Self {
            lines: BTreeMap::new(),
            version,
        }
    }

    /// Get highlights for a specific line
    pub fn line(&self, line: usize) -> Option<&LineHighlights> {
        self.lines.get(&line)
    }

    /// Get spans for a line, or an empty slice if none
    pub fn line_spans(&self, line: usize) -> &[HighlightSpan] {
        self.lines
            .get(&line)
            .map(|lh| lh.spans.as_slice())
            .unwrap_or(&[])
    }

    /// Total span count across all lines
    pub fn span_count(&self) -> usize {
        self.lines.values().map(|lh| lh.spans.len()).sum()
    }

    /// Returns true if any span on any line carries the given group name.
    pub fn contains_group(&self, group: &str) -> bool {
        self.lines
            .values()
            .any(|lh| lh.spans.iter().any(|s| s.group == group))
    }

    /// Shift stored lines to account for a text edit, so spans outside the
    /// re-queried scope stay aligned while the edited region is re-filled.
    ///
    /// Lines touched by the edit (start row through old end row) are
    /// cleared; lines past the edit move by the row delta.
    pub fn shift_for_edit(&mut self, edit: &Edit) {
        let start_row = edit.start_position.row;
        let old_end_row = edit.old_end_position.row;
        let delta = edit.new_end_position.row as isize - old_end_row as isize;

        let mut shifted = BTreeMap::new();
        for (line, highlights) in std::mem::take(&mut self.lines) {
            if line < start_row {
                shifted.insert(line, highlights);
            } else if line > old_end_row {
                let new_line = line as isize + delta;
                if new_line >= 0 {
                    shifted.insert(new_line as usize, highlights);
                }
            }
            // Lines within start_row..=old_end_row are dropped; the engine
            // re-queries that region after the reparse.
        }
        self.lines = shifted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Position;

    fn span(start: usize, end: usize, group: &str) -> HighlightSpan {
        HighlightSpan {
            start_col: start,
            end_col: end,
            group: group.to_string(),
        }
    }

    fn line_with(spans: Vec<HighlightSpan>) -> LineHighlights {
        LineHighlights {
            spans,
            dropped: Vec::new(),
        }
    }

    fn edit_rows(start: usize, old_end: usize, new_end: usize) -> Edit {
        Edit {
            start_byte: 0,
            old_end_byte: 0,
            new_end_byte: 0,
            start_position: Position::new(start, 0),
            old_end_position: Position::new(old_end, 0),
            new_end_position: Position::new(new_end, 0),
        }
    }

    #[test]
    fn test_group_at() {
        let line = line_with(vec![span(0, 5, "keyword"), span(10, 15, "string")]);

        assert_eq!(line.group_at(0), Some("keyword"));
        assert_eq!(line.group_at(4), Some("keyword"));
        assert_eq!(line.group_at(5), None);
        assert_eq!(line.group_at(12), Some("string"));
        assert_eq!(line.group_at(15), None);
    }

    #[test]
    fn test_shift_for_edit_insert_line() {
        let mut highlights = SyntaxHighlights::new(1);
        highlights.lines.insert(0, line_with(vec![span(0, 2, "keyword")]));
        highlights.lines.insert(1, line_with(vec![span(0, 3, "string")]));
        highlights.lines.insert(2, line_with(vec![span(0, 4, "comment")]));

        // Newline inserted on line 1: rows 1..=1 edited, one row added
        highlights.shift_for_edit(&edit_rows(1, 1, 2));

        assert!(highlights.lines.contains_key(&0));
        assert!(!highlights.lines.contains_key(&1));
        assert_eq!(highlights.line_spans(3)[0].group, "comment");
    }

    #[test]
    fn test_shift_for_edit_delete_line() {
        let mut highlights = SyntaxHighlights::new(1);
        highlights.lines.insert(0, line_with(vec![span(0, 2, "keyword")]));
        highlights.lines.insert(1, line_with(vec![span(0, 3, "string")]));
        highlights.lines.insert(2, line_with(vec![span(0, 4, "comment")]));
        highlights.lines.insert(3, line_with(vec![span(0, 5, "number")]));

        // Rows 1..=2 collapsed into row 1
        highlights.shift_for_edit(&edit_rows(1, 2, 1));

        assert!(highlights.lines.contains_key(&0));
        assert!(!highlights.lines.contains_key(&1));
        assert_eq!(highlights.line_spans(2)[0].group, "number");
    }

    #[test]
    fn test_shift_for_edit_same_line() {
        let mut highlights = SyntaxHighlights::new(1);
        highlights.lines.insert(0, line_with(vec![span(0, 5, "keyword")]));
        highlights.lines.insert(1, line_with(vec![span(0, 3, "string")]));

        highlights.shift_for_edit(&edit_rows(0, 0, 0));

        assert!(!highlights.lines.contains_key(&0));
        assert!(highlights.lines.contains_key(&1));
    }

    #[test]
    fn test_contains_group() {
        let mut highlights = SyntaxHighlights::new(1);
        highlights.lines.insert(0, line_with(vec![span(0, 5, "keyword")]));

        assert!(highlights.contains_group("keyword"));
        assert!(!highlights.contains_group("string"));
    }
}

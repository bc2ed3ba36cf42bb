//! Changed-code view extraction from a per-file patch.
//!
//! Hosts return one unified-diff fragment per file (hunks only, no
//! `diff --git` header). The review works on the "changed code" view:
//! added lines plus unchanged context, each tagged with its line number
//! in the new version of the file. Removed lines are dropped; they no
//! longer exist in the code under review.

/// One line of the reconstructed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLine {
    /// Line number in the new version of the file (1-based).
    pub number: u32,
    pub content: String,
}

/// The reviewable portion of a changed file.
#[derive(Debug, Clone, Default)]
pub struct ChangedView {
    lines: Vec<ViewLine>,
}

impl ChangedView {
    /// Parse a hunk-formatted patch into a changed-code view.
    ///
    /// Tolerates full diff headers before the first hunk, empty context
    /// lines emitted without their leading space, and "\ No newline"
    /// markers. Unrecognised content ends the current hunk rather than
    /// corrupting line numbers.
    pub fn from_patch(patch: &str) -> Self {
        let mut lines = Vec::new();
        let mut new_line: u32 = 0;
        let mut in_hunk = false;

        for raw in patch.lines() {
            if raw.starts_with("@@") {
                match parse_new_start(raw) {
                    Some(start) => {
                        new_line = start;
                        in_hunk = true;
                    }
                    None => in_hunk = false,
                }
                continue;
            }
            if !in_hunk {
                continue;
            }

            if let Some(content) = raw.strip_prefix('+') {
                lines.push(ViewLine {
                    number: new_line,
                    content: content.to_string(),
                });
                new_line += 1;
            } else if raw.starts_with('-') {
                // Removed line, not part of the new file
            } else if let Some(content) = raw.strip_prefix(' ') {
                lines.push(ViewLine {
                    number: new_line,
                    content: content.to_string(),
                });
                new_line += 1;
            } else if raw.is_empty() {
                // Empty context line without its leading space
                lines.push(ViewLine {
                    number: new_line,
                    content: String::new(),
                });
                new_line += 1;
            } else if raw.starts_with('\\') {
                // "\ No newline at end of file"
            } else {
                in_hunk = false;
            }
        }

        ChangedView { lines }
    }

    /// The view's source text, one line per view line.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The view rendered with real file line numbers, for LLM prompts.
    /// The model reports these numbers back directly.
    pub fn numbered(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}: {}", l.number, l.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Map a 1-based line of `text()` back to its new-file line number.
    pub fn map_line(&self, view_line: u32) -> Option<u32> {
        if view_line == 0 {
            return None;
        }
        self.lines.get(view_line as usize - 1).map(|l| l.number)
    }

    pub fn lines(&self) -> &[ViewLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Extract the new-file start line from a `@@ -a,b +c,d @@` header.
fn parse_new_start(header: &str) -> Option<u32> {
    let rest = header.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    let new_part = rest[..end].split(' ').find(|p| p.starts_with('+'))?;
    let range = new_part.strip_prefix('+')?;
    let start = match range.split_once(',') {
        Some((s, _)) => s.parse().ok()?,
        None => range.parse().ok()?,
    };
    Some(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PATCH: &str = "@@ -1,3 +1,4 @@\n def handler(event):\n-    old = 1\n+    user_id = event[\"id\"]\n+    query = lookup(user_id)\n     return query";

    #[test]
    fn keeps_added_and_context_drops_removed() {
        let view = ChangedView::from_patch(PATCH);
        assert_eq!(
            view.text(),
            "def handler(event):\n    user_id = event[\"id\"]\n    query = lookup(user_id)\n    return query"
        );
        assert!(!view.text().contains("old = 1"));
    }

    #[test]
    fn tracks_new_file_line_numbers() {
        let view = ChangedView::from_patch(PATCH);
        let numbers: Vec<u32> = view.lines().iter().map(|l| l.number).collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
    }

    #[test]
    fn map_line_translates_view_positions() {
        let patch = "@@ -10,2 +10,3 @@\n ctx\n+inserted\n ctx2";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.map_line(1), Some(10));
        assert_eq!(view.map_line(2), Some(11));
        assert_eq!(view.map_line(3), Some(12));
        assert_eq!(view.map_line(0), None);
        assert_eq!(view.map_line(4), None);
    }

    #[test]
    fn multiple_hunks_restart_numbering() {
        let patch = "@@ -1,2 +1,2 @@\n a\n+b\n@@ -40,2 +41,2 @@\n c\n+d";
        let view = ChangedView::from_patch(patch);
        let numbers: Vec<u32> = view.lines().iter().map(|l| l.number).collect();
        assert_eq!(numbers, [1, 2, 41, 42]);
    }

    #[test]
    fn skips_full_diff_header_before_first_hunk() {
        let patch = "--- a/app.py\n+++ b/app.py\n@@ -1 +1 @@\n+x = 1";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.text(), "x = 1");
        assert_eq!(view.lines()[0].number, 1);
    }

    #[test]
    fn handles_bare_empty_context_line() {
        let patch = "@@ -1,3 +1,3 @@\n a\n\n b";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.text(), "a\n\nb");
        assert_eq!(view.lines()[2].number, 3);
    }

    #[test]
    fn skips_no_newline_marker() {
        let patch = "@@ -1 +1 @@\n-old\n+new\n\\ No newline at end of file";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.text(), "new");
    }

    #[test]
    fn removal_only_patch_keeps_context() {
        let patch = "@@ -1,3 +1,2 @@\n keep\n-gone\n keep2";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.text(), "keep\nkeep2");
        let numbers: Vec<u32> = view.lines().iter().map(|l| l.number).collect();
        assert_eq!(numbers, [1, 2]);
    }

    #[test]
    fn numbered_rendering_for_prompts() {
        let patch = "@@ -10,1 +10,2 @@\n ctx\n+new_line()";
        let view = ChangedView::from_patch(patch);
        assert_eq!(view.numbered(), "10: ctx\n11: new_line()");
    }

    #[test]
    fn garbage_input_is_empty_view() {
        assert!(ChangedView::from_patch("").is_empty());
        assert!(ChangedView::from_patch("not a diff at all").is_empty());
    }
}

//! Merging freshly rendered diary lines into an existing note.
//!
//! The merge is a pure text transformation. It never touches the filesystem,
//! so the caller can compute the full replacement before writing anything.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Line that opens and closes the front-matter block at the top of a note.
pub const METADATA_DELIMITER: &str = "---";

/// Order in which diary lines are kept in the note.
///
/// `Ascending` keeps the oldest entry first and appends new material at the
/// bottom. `Descending` keeps the newest entry first and prepends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" => Ok(Self::Descending),
            other => Err(format!(
                "unknown sort direction '{other}' (expected ascending or descending)"
            )),
        }
    }
}

/// Result of a merge: the full replacement text plus bookkeeping for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Complete new contents of the note.
    pub content: String,
    /// Rendered items that were not in the note yet.
    pub added: usize,
    /// Rendered items dropped as duplicates (already present, or repeated in
    /// the new batch).
    pub skipped: usize,
}

/// Merge `new_lines` into `existing` note contents.
///
/// `new_lines` must already be ordered the way `direction` expects (oldest
/// first for ascending, newest first for descending). Existing body lines are
/// never reordered: ascending appends unseen items after them, descending
/// prepends unseen items before them.
///
/// A leading front-matter block (`---` on the first line through the next
/// `---` line) is carried over verbatim and stays first. Without a closing
/// delimiter the whole file is body. A `---` line further down the body is
/// ordinary body text.
///
/// Items may span several lines (callout blocks). Such an item counts as
/// present when its lines occur as a contiguous run in the body.
///
/// With `existing == None` the result is just the deduplicated `new_lines`
/// joined by newlines.
pub fn merge(
    new_lines: &[String],
    existing: Option<&str>,
    direction: SortDirection,
) -> MergeOutcome {
    let Some(existing) = existing else {
        let mut seen = HashSet::new();
        let fresh: Vec<&str> = new_lines
            .iter()
            .map(String::as_str)
            .filter(|item| seen.insert(*item))
            .collect();
        return MergeOutcome {
            content: fresh.join("\n"),
            added: fresh.len(),
            skipped: new_lines.len() - fresh.len(),
        };
    };

    let lines: Vec<&str> = if existing.is_empty() {
        Vec::new()
    } else {
        existing.split('\n').collect()
    };
    let (metadata, body) = split_metadata(&lines);

    let body_set: HashSet<&str> = body.iter().copied().collect();
    let mut batch_seen = HashSet::new();
    let mut fresh: Vec<&str> = Vec::new();
    let mut skipped = 0;

    for item in new_lines.iter().map(String::as_str) {
        if !batch_seen.insert(item) || is_present(item, body, &body_set) {
            skipped += 1;
            continue;
        }
        fresh.push(item);
    }

    if fresh.is_empty() {
        return MergeOutcome {
            content: existing.to_string(),
            added: 0,
            skipped,
        };
    }

    let added = fresh.len();
    let spliced: Vec<&str> = match direction {
        SortDirection::Ascending => body.iter().copied().chain(fresh).collect(),
        SortDirection::Descending => fresh.into_iter().chain(body.iter().copied()).collect(),
    };

    let content = metadata
        .iter()
        .copied()
        .chain(spliced)
        .collect::<Vec<_>>()
        .join("\n");

    MergeOutcome {
        content,
        added,
        skipped,
    }
}

/// Split note lines into the front-matter block (delimiters included) and
/// the body. Only a block opening on the very first line counts.
pub fn split_metadata<'l, 'a>(lines: &'l [&'a str]) -> (&'l [&'a str], &'l [&'a str]) {
    if lines.first().is_some_and(|line| is_delimiter(line)) {
        if let Some(offset) = lines[1..].iter().position(|line| is_delimiter(line)) {
            return lines.split_at(offset + 2);
        }
    }
    (&[], lines)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches('\r') == METADATA_DELIMITER
}

fn is_present(item: &str, body: &[&str], body_set: &HashSet<&str>) -> bool {
    if !item.contains('\n') {
        return body_set.contains(item);
    }

    // A block's closing newline may have been trimmed from the end of the note
    let parts: Vec<&str> = item.trim_end_matches('\n').split('\n').collect();
    if !parts.iter().all(|part| body_set.contains(part)) {
        return false;
    }
    body.windows(parts.len()).any(|window| window == parts.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    #[test]
    fn test_absent_file_joins_new_lines() {
        let out = merge(&lines(&["L1", "L2"]), None, SortDirection::Ascending);
        assert_eq!(out.content, "L1\nL2");
        assert_eq!(out.added, 2);
        assert_eq!(out.skipped, 0);
    }

    #[test]
    fn test_existing_line_not_duplicated() {
        let out = merge(&lines(&["L0", "L1"]), Some("L0"), SortDirection::Ascending);
        assert_eq!(out.content, "L0\nL1");
        assert_eq!(out.added, 1);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_descending_prepends_after_metadata() {
        let out = merge(
            &lines(&["L1"]),
            Some("---\nkey: v\n---\nL0"),
            SortDirection::Descending,
        );
        assert_eq!(out.content, "---\nkey: v\n---\nL1\nL0");
    }

    #[test]
    fn test_ascending_appends_after_metadata_and_body() {
        let out = merge(
            &lines(&["L2", "L3"]),
            Some("---\nkey: v\n---\nL0\nL1"),
            SortDirection::Ascending,
        );
        assert_eq!(out.content, "---\nkey: v\n---\nL0\nL1\nL2\nL3");
    }

    #[test]
    fn test_descending_keeps_new_batch_order() {
        let out = merge(&lines(&["L3", "L2"]), Some("L1\nL0"), SortDirection::Descending);
        assert_eq!(out.content, "L3\nL2\nL1\nL0");
    }

    // ========================================================================
    // Edge cases
    // ========================================================================

    #[test]
    fn test_empty_new_lines_leaves_content_unchanged() {
        let existing = "---\ntags: film\n---\nL0\nL1\n";
        let out = merge(&[], Some(existing), SortDirection::Descending);
        assert_eq!(out.content, existing);
        assert_eq!(out.added, 0);
    }

    #[test]
    fn test_unclosed_metadata_is_all_body() {
        let out = merge(&lines(&["L1"]), Some("---\nkey: v\nL0"), SortDirection::Descending);
        assert_eq!(out.content, "L1\n---\nkey: v\nL0");
    }

    #[test]
    fn test_delimiter_in_body_is_not_metadata() {
        // Only the first two delimiters count; the third is plain body text
        let existing = "---\na: 1\n---\nL0\n---\nL1";
        let out = merge(&lines(&["---", "L2"]), Some(existing), SortDirection::Descending);
        assert_eq!(out.content, "---\na: 1\n---\nL2\nL0\n---\nL1");
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_metadata_only_file() {
        let out = merge(&lines(&["L0"]), Some("---\na: 1\n---"), SortDirection::Ascending);
        assert_eq!(out.content, "---\na: 1\n---\nL0");
    }

    #[test]
    fn test_body_delimiter_when_first_line_is_not_delimiter() {
        let out = merge(&lines(&["L1"]), Some("L0\n---\nx\n---"), SortDirection::Descending);
        assert_eq!(out.content, "L1\nL0\n---\nx\n---");
    }

    #[test]
    fn test_empty_existing_file_is_empty_body() {
        let out = merge(&lines(&["L1", "L2"]), Some(""), SortDirection::Ascending);
        assert_eq!(out.content, "L1\nL2");
    }

    #[test]
    fn test_duplicates_within_batch_collapse() {
        let out = merge(&lines(&["L1", "L1", "L2"]), None, SortDirection::Ascending);
        assert_eq!(out.content, "L1\nL2");
        assert_eq!(out.skipped, 1);

        let out = merge(&lines(&["L1", "L1"]), Some("L0"), SortDirection::Ascending);
        assert_eq!(out.content, "L0\nL1");
    }

    #[test]
    fn test_crlf_metadata_block_preserved_verbatim() {
        let existing = "---\r\ntitle: Diary\r\n---\r\nL0";
        let out = merge(&lines(&["L1"]), Some(existing), SortDirection::Descending);
        assert_eq!(out.content, "---\r\ntitle: Diary\r\n---\r\nL1\nL0");
    }

    #[test]
    fn test_does_not_resort_existing_lines() {
        // Existing body is in "wrong" order; it must be left alone
        let out = merge(&lines(&["C"]), Some("B\nA"), SortDirection::Ascending);
        assert_eq!(out.content, "B\nA\nC");
    }

    // ========================================================================
    // Multi-line blocks
    // ========================================================================

    #[test]
    fn test_block_items_are_deduplicated_as_a_unit() {
        let block_a = "> [!letterboxd] A\n> great\n".to_string();
        let block_b = "> [!letterboxd] B\n> fine\n".to_string();

        let first = merge(&[block_a.clone()], None, SortDirection::Ascending);
        let second = merge(
            &[block_a.clone(), block_b.clone()],
            Some(&first.content),
            SortDirection::Ascending,
        );
        assert_eq!(
            second.content,
            "> [!letterboxd] A\n> great\n\n> [!letterboxd] B\n> fine\n"
        );
        assert_eq!(second.added, 1);

        let third = merge(&[block_a, block_b], Some(&second.content), SortDirection::Ascending);
        assert_eq!(third.content, second.content);
        assert_eq!(third.added, 0);
    }

    #[test]
    fn test_block_found_when_note_lost_final_newline() {
        let block = "> [!letterboxd] A\n> great\n".to_string();
        let out = merge(&[block], Some("intro\n> [!letterboxd] A\n> great"), SortDirection::Ascending);
        assert_eq!(out.added, 0);
        assert_eq!(out.content, "intro\n> [!letterboxd] A\n> great");
    }

    #[test]
    fn test_block_with_shared_lines_but_not_contiguous_is_new() {
        let existing = "> a\n> x\n> b";
        let item = "> a\n> b".to_string();
        let out = merge(&[item], Some(existing), SortDirection::Ascending);
        assert_eq!(out.added, 1);
    }

    #[test]
    fn test_descending_blocks_stay_separated() {
        let old = "> [!letterboxd] A\n> one\n".to_string();
        let new = "> [!letterboxd] B\n> two\n".to_string();
        let first = merge(&[old], None, SortDirection::Descending);
        let second = merge(&[new], Some(&first.content), SortDirection::Descending);
        assert_eq!(
            second.content,
            "> [!letterboxd] B\n> two\n\n> [!letterboxd] A\n> one\n"
        );
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn direction() -> impl Strategy<Value = SortDirection> {
        prop_oneof![Just(SortDirection::Ascending), Just(SortDirection::Descending)]
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            existing in proptest::option::of(proptest::collection::vec("[a-c-]{0,4}", 0..6)),
            new in proptest::collection::vec("[a-d]{1,3}", 0..6),
            dir in direction(),
        ) {
            let existing = existing.map(|l| l.join("\n"));
            let once = merge(&new, existing.as_deref(), dir);
            let twice = merge(&new, Some(&once.content), dir);
            prop_assert_eq!(&twice.content, &once.content);
            prop_assert_eq!(twice.added, 0);
        }

        #[test]
        fn prop_metadata_block_preserved_and_first(
            meta in proptest::collection::vec("[a-z]{1,5}: [a-z]{0,5}", 0..4),
            body in proptest::collection::vec("[a-z-]{0,4}", 0..6),
            new in proptest::collection::vec("[a-z]{1,4}", 0..6),
            dir in direction(),
        ) {
            let block = format!("---\n{}{}---", meta.join("\n"), if meta.is_empty() { "" } else { "\n" });
            let existing = if body.is_empty() { block.clone() } else { format!("{}\n{}", block, body.join("\n")) };
            let out = merge(&new, Some(&existing), dir);
            prop_assert!(out.content.starts_with(&block));
        }

        #[test]
        fn prop_prior_order_is_preserved(
            body in proptest::collection::hash_set("[a-z]{1,4}", 0..6),
            new in proptest::collection::vec("[a-z]{1,4}", 0..6),
            dir in direction(),
        ) {
            let body: Vec<String> = body.into_iter().collect();
            let existing = body.join("\n");
            let out = merge(&new, Some(&existing), dir);
            let merged: Vec<&str> = if out.content.is_empty() { Vec::new() } else { out.content.split('\n').collect() };
            let kept: Vec<&str> = merged.iter().copied().filter(|l| body.iter().any(|b| b == l)).collect();
            prop_assert_eq!(kept, body.iter().map(String::as_str).collect::<Vec<_>>());
            match dir {
                SortDirection::Ascending => prop_assert!(merged.starts_with(&body.iter().map(String::as_str).collect::<Vec<_>>())),
                SortDirection::Descending => prop_assert!(merged.ends_with(&body.iter().map(String::as_str).collect::<Vec<_>>())),
            }
        }
    }
}

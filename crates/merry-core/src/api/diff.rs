//! Character-level diff shown when a write conflicts with an existing file

use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::io::Write;

/// A run of characters sharing one change tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub tag: ChangeTag,
    pub text: String,
}

/// Diff `old` against `new` character by character, merging adjacent changes
pub fn char_diff(old: &str, new: &str) -> Vec<DiffSegment> {
    let diff = TextDiff::from_chars(old, new);
    let mut segments: Vec<DiffSegment> = Vec::new();

    for change in diff.iter_all_changes() {
        match segments.last_mut() {
            Some(last) if last.tag == change.tag() => last.text.push_str(change.value()),
            _ => segments.push(DiffSegment {
                tag: change.tag(),
                text: change.value().to_string(),
            }),
        }
    }

    segments
}

/// Colour a diff: green additions, red deletions, dimmed common text
pub fn render(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment.tag {
            ChangeTag::Insert => segment.text.green().to_string(),
            ChangeTag::Delete => segment.text.red().to_string(),
            ChangeTag::Equal => segment.text.dimmed().to_string(),
        })
        .collect()
}

/// Print the diff between `old` and `new` to stderr
pub fn print(old: &str, new: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{}", render(&char_diff(old, new)))?;
    stderr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_diff_segments() {
        let segments = char_diff("hello world", "hello there");
        let old: String = segments
            .iter()
            .filter(|s| s.tag != ChangeTag::Insert)
            .map(|s| s.text.as_str())
            .collect();
        let new: String = segments
            .iter()
            .filter(|s| s.tag != ChangeTag::Delete)
            .map(|s| s.text.as_str())
            .collect();

        assert_eq!(old, "hello world");
        assert_eq!(new, "hello there");
        assert_eq!(segments[0].tag, ChangeTag::Equal);
        assert!(segments[0].text.starts_with("hello "));
    }

    #[test]
    fn test_identical_input_is_one_segment() {
        let segments = char_diff("same", "same");
        assert_eq!(
            segments,
            vec![DiffSegment {
                tag: ChangeTag::Equal,
                text: "same".to_string()
            }]
        );
    }

    #[test]
    fn test_render_keeps_text() {
        colored::control::set_override(false);
        let rendered = render(&char_diff("ab", "ac"));
        assert_eq!(rendered, "abc");
    }
}

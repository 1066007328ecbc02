use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("valid tag pattern"));

pub fn is_valid_tag(tag: &str) -> bool {
    TAG_PATTERN.is_match(tag)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("'{0}' is not a valid tag: use letters and digits only")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCommit {
    Added(String),
    Duplicate,
    Empty,
}

/// Tags attached to the draft, plus the pending input token and a chip
/// highlight for keyboard editing.
#[derive(Debug, Clone, Default)]
pub struct TagEditor {
    tags: Vec<String>,
    input: String,
    highlighted: Option<usize>,
}

impl TagEditor {
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    /// Feeds one keystroke into the input field. A space commits the token
    /// typed so far.
    pub fn push_char(&mut self, ch: char) -> Result<Option<TagCommit>, TagError> {
        self.highlighted = None;
        if ch == ' ' {
            return self.commit_input().map(Some);
        }
        self.input.push(ch);
        Ok(None)
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    pub fn commit_input(&mut self) -> Result<TagCommit, TagError> {
        let raw = self.input.clone();
        let outcome = self.add_tag(&raw)?;
        self.input.clear();
        Ok(outcome)
    }

    pub fn add_tag(&mut self, raw: &str) -> Result<TagCommit, TagError> {
        let token = raw.trim();
        if token.is_empty() {
            return Ok(TagCommit::Empty);
        }
        if !is_valid_tag(token) {
            return Err(TagError::Invalid(token.to_string()));
        }
        if self.contains(token) {
            return Ok(TagCommit::Duplicate);
        }
        self.tags.push(token.to_string());
        Ok(TagCommit::Added(token.to_string()))
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag);
        self.clamp_highlight();
        self.tags.len() != before
    }

    /// Pulls a tag back into the input field so it can be corrected.
    pub fn select_tag_for_edit(&mut self, tag: &str) -> bool {
        if !self.remove_tag(tag) {
            return false;
        }
        self.input = tag.to_string();
        self.highlighted = None;
        true
    }

    pub fn populate(&mut self, tags: &[String]) {
        self.tags = tags.to_vec();
        self.input.clear();
        self.highlighted = None;
    }

    pub fn clear(&mut self) {
        self.populate(&[]);
    }

    /// Moves the chip highlight; stepping right past the last chip returns
    /// focus to the input field.
    pub fn move_highlight(&mut self, delta: isize) {
        if self.tags.is_empty() {
            self.highlighted = None;
            return;
        }
        let last = self.tags.len() as isize - 1;
        let next = match self.highlighted {
            None if delta < 0 => last,
            None => return,
            Some(current) => current as isize + delta,
        };
        self.highlighted = if next > last {
            None
        } else {
            Some(next.max(0) as usize)
        };
    }

    pub fn highlighted_tag(&self) -> Option<&str> {
        self.highlighted
            .and_then(|idx| self.tags.get(idx))
            .map(String::as_str)
    }

    fn clamp_highlight(&mut self) {
        if let Some(idx) = self.highlighted {
            if self.tags.is_empty() {
                self.highlighted = None;
            } else if idx >= self.tags.len() {
                self.highlighted = Some(self.tags.len() - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn add_tag_accepts_only_alphanumeric_tokens() {
        let mut editor = TagEditor::default();
        for candidate in ["rust", "A1", "2024", "  padded  "] {
            assert_matches!(editor.add_tag(candidate), Ok(TagCommit::Added(_)));
        }
        for candidate in ["with space", "dash-ed", "emoji🙂", "under_score", "ü"] {
            assert_matches!(editor.add_tag(candidate), Err(TagError::Invalid(_)));
        }
        assert_eq!(editor.tags(), ["rust", "A1", "2024", "padded"]);
    }

    #[test]
    fn duplicates_are_ignored_silently() {
        let mut editor = TagEditor::default();
        editor.add_tag("a").unwrap();
        assert_eq!(editor.add_tag("a"), Ok(TagCommit::Duplicate));
        assert_eq!(editor.tags(), ["a"]);
    }

    #[test]
    fn long_tokens_are_kept_whole() {
        let mut editor = TagEditor::default();
        let long = "a1".repeat(40);
        for ch in long.chars() {
            assert_eq!(editor.push_char(ch), Ok(None));
        }
        assert_eq!(editor.push_char(' '), Ok(Some(TagCommit::Added(long.clone()))));
        assert_eq!(editor.tags(), [long]);
    }

    #[test]
    fn trailing_space_commits_the_token() {
        let mut editor = TagEditor::default();
        for ch in "todo".chars() {
            assert_eq!(editor.push_char(ch), Ok(None));
        }
        assert_eq!(
            editor.push_char(' '),
            Ok(Some(TagCommit::Added("todo".into())))
        );
        assert_eq!(editor.input(), "");
        assert_eq!(editor.tags(), ["todo"]);
    }

    #[test]
    fn invalid_token_keeps_input_for_correction() {
        let mut editor = TagEditor::default();
        for ch in "bad!".chars() {
            editor.push_char(ch).unwrap();
        }
        assert!(editor.commit_input().is_err());
        assert_eq!(editor.input(), "bad!");
        assert!(editor.is_empty());
    }

    #[test]
    fn remove_tag_is_idempotent() {
        let mut editor = TagEditor::default();
        editor.populate(&["a".into(), "b".into()]);
        assert!(editor.remove_tag("a"));
        assert!(!editor.remove_tag("a"));
        assert_eq!(editor.tags(), ["b"]);
    }

    #[test]
    fn select_tag_for_edit_moves_tag_into_input() {
        let mut editor = TagEditor::default();
        editor.populate(&["alpha".into(), "beta".into()]);
        assert!(editor.select_tag_for_edit("alpha"));
        assert_eq!(editor.tags(), ["beta"]);
        assert_eq!(editor.input(), "alpha");
        assert!(!editor.select_tag_for_edit("missing"));
    }

    #[test]
    fn highlight_walks_chips_from_the_right() {
        let mut editor = TagEditor::default();
        editor.populate(&["a".into(), "b".into(), "c".into()]);
        editor.move_highlight(1);
        assert_eq!(editor.highlighted(), None);
        editor.move_highlight(-1);
        assert_eq!(editor.highlighted_tag(), Some("c"));
        editor.move_highlight(-5);
        assert_eq!(editor.highlighted_tag(), Some("a"));
        editor.remove_tag("a");
        assert_eq!(editor.highlighted_tag(), Some("b"));
        editor.move_highlight(5);
        assert_eq!(editor.highlighted(), None);
    }
}

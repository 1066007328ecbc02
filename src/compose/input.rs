use unicode_segmentation::UnicodeSegmentation;

/// Multi-line text buffer for the compose dialog. The cursor is a byte offset
/// that always sits on a grapheme boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    buffer: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_text(text: &str) -> Self {
        Self {
            buffer: text.to_string(),
            cursor: text.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn trimmed(&self) -> &str {
        self.buffer.trim()
    }

    pub fn set(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.cursor = self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, ch: char) {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.buffer.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        true
    }

    pub fn move_right(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let start = line_start(&self.buffer, self.cursor);
        let moved = start != self.cursor;
        self.cursor = start;
        moved
    }

    pub fn move_end(&mut self) -> bool {
        let end = line_end(&self.buffer, self.cursor);
        let moved = end != self.cursor;
        self.cursor = end;
        moved
    }

    /// Zero-based (line, column) of the cursor, columns counted in graphemes.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.buffer[..self.cursor];
        let line = before.matches('\n').count();
        let start = line_start(&self.buffer, self.cursor);
        (line, self.buffer[start..self.cursor].graphemes(true).count())
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backspace_removes_whole_grapheme() {
        let mut input = TextInput::with_text("cafe\u{301}");
        assert!(input.backspace());
        assert_eq!(input.as_str(), "caf");
        assert_eq!(input.cursor(), 3);
    }

    #[test]
    fn home_and_end_stay_on_current_line() {
        let mut input = TextInput::default();
        for ch in "first".chars() {
            input.insert_char(ch);
        }
        input.insert_newline();
        for ch in "second".chars() {
            input.insert_char(ch);
        }
        assert!(input.move_home());
        assert_eq!(input.cursor_position(), (1, 0));
        assert!(!input.move_home());
        input.move_left();
        assert_eq!(input.cursor_position(), (0, 5));
        input.move_home();
        assert!(input.move_end());
        assert_eq!(input.cursor_position(), (0, 5));
    }

    #[test]
    fn delete_at_end_is_noop() {
        let mut input = TextInput::with_text("abc");
        assert!(!input.delete());
        input.move_left();
        assert!(input.delete());
        assert_eq!(input.as_str(), "ab");
    }
}

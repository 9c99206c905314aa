//! Character-offset access to article text.
//!
//! Spans in kblink are character offsets, while Rust string slicing and
//! `str::find` work in bytes. [`CharText`] precomputes the char→byte table
//! once per article so that every lookup the linkers do (character at an
//! offset, slice by span, literal search from an offset) is O(1) or a plain
//! byte search.
//!
//! ```text
//! Text:   "Café Müller"
//! chars:   C a f é ␠ M ü l l e r
//! char:    0 1 2 3 4 5 6 7 8 9 10
//! byte:    0 1 2 3 5 6 7 9 10 11 12   (é and ü take two bytes)
//! ```

use kblink_core::Span;

/// Char-indexed view over a borrowed text.
#[derive(Debug, Clone)]
pub struct CharText<'a> {
    text: &'a str,
    /// `char_to_byte[i]` is the byte offset of char `i`; has `len + 1` entries.
    /// Empty for ASCII text, where the mapping is the identity.
    char_to_byte: Vec<usize>,
    chars: Vec<char>,
}

impl<'a> CharText<'a> {
    /// Index a text.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let char_to_byte = if text.is_ascii() {
            Vec::new()
        } else {
            let mut map: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
            map.push(text.len());
            map
        };
        Self {
            text,
            char_to_byte,
            chars,
        }
    }

    /// The underlying text.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether the text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// All characters.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Character at a char offset.
    #[must_use]
    pub fn char_at(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    /// Whether the character at `idx` is alphabetic.
    #[must_use]
    pub fn is_alpha_at(&self, idx: usize) -> bool {
        self.char_at(idx).is_some_and(char::is_alphabetic)
    }

    /// Convert a char offset to a byte offset (clamped to the text end).
    #[must_use]
    pub fn char_to_byte(&self, idx: usize) -> usize {
        if self.char_to_byte.is_empty() {
            idx.min(self.text.len())
        } else {
            self.char_to_byte
                .get(idx)
                .copied()
                .unwrap_or(self.text.len())
        }
    }

    /// Convert a byte offset (on a char boundary) to a char offset.
    #[must_use]
    pub fn byte_to_char(&self, byte_idx: usize) -> usize {
        if self.char_to_byte.is_empty() {
            byte_idx
        } else {
            self.char_to_byte
                .binary_search(&byte_idx)
                .unwrap_or_else(|insert_at| insert_at)
        }
    }

    /// Slice by char offsets `[start, end)`.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let from = self.char_to_byte(start);
        let to = self.char_to_byte(end).max(from);
        &self.text[from..to]
    }

    /// Slice by span.
    #[must_use]
    pub fn span_text(&self, span: &Span) -> &'a str {
        self.slice(span.start, span.end)
    }

    /// Find the next literal occurrence of `needle` at or after char offset
    /// `from`, returning its char offset.
    #[must_use]
    pub fn find(&self, needle: &str, from: usize) -> Option<usize> {
        if from > self.len() {
            return None;
        }
        let byte_from = self.char_to_byte(from);
        self.text[byte_from..]
            .find(needle)
            .map(|rel| self.byte_to_char(byte_from + rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identity() {
        let text = CharText::new("Hello World");
        assert_eq!(text.len(), 11);
        assert_eq!(text.slice(6, 11), "World");
        assert_eq!(text.find("o", 5), Some(7));
        assert_eq!(text.find("o", 8), None);
    }

    #[test]
    fn test_multibyte_offsets() {
        let text = CharText::new("Café Müller and Müller");
        assert_eq!(text.slice(5, 11), "Müller");
        assert_eq!(text.find("Müller", 0), Some(5));
        assert_eq!(text.find("Müller", 6), Some(16));
        assert_eq!(text.char_at(3), Some('é'));
        assert_eq!(text.byte_to_char(text.char_to_byte(16)), 16);
    }

    #[test]
    fn test_find_past_end() {
        let text = CharText::new("abc");
        assert_eq!(text.find("a", 4), None);
        assert_eq!(text.find("", 3), Some(3));
    }
}

//! Bounded buffer for characters typed on the entry surface.

use kiosklock_core::constants::MAX_ENTRY_LENGTH;

/// Characters entered so far, capped at a maximum length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBuffer {
    chars: String,
    max_len: usize,
}

impl EntryBuffer {
    /// Create an empty buffer holding at most `max_len` characters.
    pub fn new(max_len: usize) -> Self {
        Self {
            chars: String::with_capacity(max_len),
            max_len,
        }
    }

    /// Append `ch`. Returns `false` without modifying the buffer if it is full.
    #[must_use]
    pub fn push(&mut self, ch: char) -> bool {
        if self.is_full() {
            return false;
        }
        self.chars.push(ch);
        true
    }

    /// Remove and return the last character.
    pub fn pop(&mut self) -> Option<char> {
        self.chars.pop()
    }

    /// Empty the buffer. Returns `true` if it held anything.
    pub fn clear(&mut self) -> bool {
        let had_input = !self.chars.is_empty();
        self.chars.clear();
        had_input
    }

    /// The entered characters.
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    /// Number of entered characters.
    pub fn len(&self) -> usize {
        self.chars.chars().count()
    }

    /// Returns `true` if nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns `true` if no more characters fit.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_len
    }

    /// Maximum number of characters.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for EntryBuffer {
    fn default() -> Self {
        Self::new(MAX_ENTRY_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut entry = EntryBuffer::new(3);
        assert!(entry.push('1'));
        assert!(entry.push('2'));
        assert!(entry.push('3'));
        assert!(entry.is_full());
        assert!(!entry.push('4'));
        assert_eq!(entry.as_str(), "123");
    }

    #[test]
    fn test_pop_and_clear() {
        let mut entry = EntryBuffer::default();
        assert_eq!(entry.max_len(), MAX_ENTRY_LENGTH);
        assert_eq!(entry.pop(), None);
        assert!(!entry.clear());

        assert!(entry.push('7'));
        assert!(entry.push('8'));
        assert_eq!(entry.pop(), Some('8'));
        assert_eq!(entry.len(), 1);
        assert!(entry.clear());
        assert!(entry.is_empty());
    }
}

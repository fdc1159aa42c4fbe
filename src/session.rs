use std::collections::BTreeSet;

use crate::state::Timestamp;

/// Characters per word for tempo.
pub const CHARS_PER_WORD: f64 = 5.0;
/// Tempo reads 0 until this much time has passed, to avoid early spikes.
pub const MIN_TEMPO_ELAPSED_MS: i64 = 6_000;
pub const MAX_TEMPO: f64 = 999.0;

/// Ephemeral state of one exercise. Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypingSession {
    target: Vec<char>,
    typed: Vec<char>,
    cursor: usize,
    mistakes: BTreeSet<usize>,
    pub started_at: Option<Timestamp>,
    pub last_space_at: Option<Timestamp>,
}

impl TypingSession {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.chars().collect(),
            ..Self::default()
        }
    }

    pub fn target_text(&self) -> String {
        self.target.iter().collect()
    }

    pub fn typed_text(&self) -> String {
        self.typed.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn typed_len(&self) -> usize {
        self.typed.len()
    }

    pub fn mistakes(&self) -> &BTreeSet<usize> {
        &self.mistakes
    }

    pub fn is_mistake(&self, idx: usize) -> bool {
        self.mistakes.contains(&idx)
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.target.get(idx).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor > 0 && self.cursor == self.target.len()
    }

    /// Types `c` at the cursor. Returns `(correct, index)` or `None` when the
    /// script is already fully typed.
    pub fn advance(&mut self, c: char, now: Timestamp) -> Option<(bool, usize)> {
        let idx = self.cursor;
        let expected = self.expected_char(idx)?;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }

        let correct = c == expected;
        self.typed.push(c);
        if !correct {
            self.mistakes.insert(idx);
        }
        self.cursor += 1;
        Some((correct, idx))
    }

    /// Steps back one character, un-marking a mistake there. Returns `false`
    /// at the start of the script.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.typed.pop();
        self.mistakes.remove(&self.cursor);
        true
    }

    /// Effective words per minute over the typed prefix.
    pub fn tempo(&self, now: Timestamp) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        if self.typed.is_empty() {
            return 0.0;
        }
        let elapsed = now - started;
        if elapsed < MIN_TEMPO_ELAPSED_MS {
            return 0.0;
        }
        let words = self.typed.len() as f64 / CHARS_PER_WORD;
        let minutes = elapsed as f64 / 60_000.0;
        (words / minutes).round().clamp(0.0, MAX_TEMPO)
    }

    /// Accuracy of the current typed prefix; 100 before any input.
    pub fn accuracy(&self) -> f64 {
        if self.typed.is_empty() {
            return 100.0;
        }
        let typed = self.typed.len() as f64;
        let mistakes = self.mistakes.len() as f64;
        ((typed - mistakes) / typed * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_blank() {
        let session = TypingSession::new("hello");
        assert_eq!(session.len(), 5);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.typed_text(), "");
        assert_eq!(session.accuracy(), 100.0);
        assert_eq!(session.tempo(10_000), 0.0);
        assert!(!session.is_complete());
    }

    #[test]
    fn advance_marks_mistakes_at_pre_advance_index() {
        let mut session = TypingSession::new("ab");
        assert_eq!(session.advance('x', 0), Some((false, 0)));
        assert!(session.is_mistake(0));
        assert_eq!(session.advance('b', 10), Some((true, 1)));
        assert_eq!(session.advance('c', 20), None);
        assert_eq!(session.cursor(), 2);
        assert!(session.is_complete());
        assert_eq!(session.started_at, Some(0));
    }

    #[test]
    fn backspace_unmarks_mistake() {
        let mut session = TypingSession::new("ab");
        session.advance('x', 0);
        assert!(session.backspace());
        assert!(session.mistakes().is_empty());
        assert_eq!(session.cursor(), 0);
        assert!(!session.backspace());
    }

    #[test]
    fn tempo_waits_six_seconds() {
        let mut session = TypingSession::new("abcdefghij");
        session.started_at = Some(0);
        for c in "abcdefghij".chars() {
            session.advance(c, 100);
        }
        assert_eq!(session.tempo(5_999), 0.0);
        // 10 chars = 2 words in 0.1 minutes
        assert_eq!(session.tempo(6_000), 20.0);
        assert_eq!(session.tempo(60_000), 2.0);
    }

    #[test]
    fn tempo_is_capped() {
        let text = "a".repeat(2_000);
        let mut session = TypingSession::new(&text);
        session.started_at = Some(0);
        for c in text.chars() {
            session.advance(c, 0);
        }
        assert_eq!(session.tempo(6_000), 999.0);
    }

    #[test]
    fn accuracy_stays_in_bounds() {
        let mut session = TypingSession::new("abcd");
        for c in "wxyz".chars() {
            session.advance(c, 0);
            let acc = session.accuracy();
            assert!((0.0..=100.0).contains(&acc));
        }
        assert_eq!(session.accuracy(), 0.0);
    }
}

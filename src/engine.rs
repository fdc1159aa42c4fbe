use tracing::{debug, trace};

use crate::keys::{classify, Key, KeyAction};
use crate::session::TypingSession;
use crate::state::Timestamp;

/// Two spaces closer together than this trigger panic mode.
pub const PANIC_DOUBLE_TAP_MS: i64 = 300;

/// What the engine reports back after a keypress. The engine never touches
/// the store; the host turns these into store events.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    KeystrokeRecorded { correct: bool, index: usize },
    TempoUpdated(f64),
    PanicTriggered,
    Completed(CompletionResult),
}

/// Snapshot of a finished exercise, taken from the engine's own view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionResult {
    pub tempo: f64,
    /// Accuracy of the final typed text (corrected mistakes excluded).
    pub accuracy: f64,
    pub mistakes: usize,
    pub typed: usize,
}

/// Consumes raw keys against one target script.
#[derive(Debug, Default)]
pub struct TypingEngine {
    session: TypingSession,
    paused: bool,
    completed: bool,
    generation: u64,
}

impl TypingEngine {
    pub fn new(target: &str) -> Self {
        Self {
            session: TypingSession::new(target),
            ..Self::default()
        }
    }

    pub fn session(&self) -> &TypingSession {
        &self.session
    }

    /// Incremented every time the session is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Presents a new script. Clears the completion latch.
    pub fn load(&mut self, target: &str) {
        self.session = TypingSession::new(target);
        self.completed = false;
        self.paused = false;
        self.generation += 1;
        debug!(generation = self.generation, len = self.session.len(), "script loaded");
    }

    /// Restarts the current script from the top.
    pub fn retry(&mut self) {
        let target = self.session.target_text();
        self.load(&target);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_completed(&self) -> bool {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    pub fn tempo(&self, now: Timestamp) -> f64 {
        self.session.tempo(now)
    }

    pub fn accuracy(&self) -> f64 {
        self.session.accuracy()
    }

    /// Feeds one keypress. Returns the events it produced, in order.
    pub fn on_key(&mut self, key: Key, ctrl: bool, now: Timestamp) -> Vec<StageEvent> {
        if self.paused || self.completed {
            return Vec::new();
        }

        let c = match classify(key, ctrl) {
            KeyAction::Ignore => return Vec::new(),
            KeyAction::Backspace => {
                // Corrections never reach the store's counters.
                self.session.backspace();
                return Vec::new();
            }
            KeyAction::Type(c) => c,
        };

        if c == ' ' {
            let double_tap = self
                .session
                .last_space_at
                .is_some_and(|last| now - last < PANIC_DOUBLE_TAP_MS);
            if double_tap {
                self.session.last_space_at = None;
                debug!("double space, panic mode");
                return vec![StageEvent::PanicTriggered];
            }
            self.session.last_space_at = Some(now);
        }

        let Some((correct, index)) = self.session.advance(c, now) else {
            return Vec::new();
        };
        trace!(index, correct, "keystroke");

        let mut events = vec![StageEvent::KeystrokeRecorded { correct, index }];
        let tempo = self.session.tempo(now);
        if tempo > 0.0 {
            events.push(StageEvent::TempoUpdated(tempo));
        }
        if let Some(result) = self.take_completion(now) {
            events.push(StageEvent::Completed(result));
        }
        events
    }

    /// Returns the completion result the first time the script is finished,
    /// and `None` on every call after that.
    pub fn take_completion(&mut self, now: Timestamp) -> Option<CompletionResult> {
        if self.completed || !self.session.is_complete() {
            return None;
        }
        self.completed = true;
        let result = CompletionResult {
            tempo: self.session.tempo(now),
            accuracy: self.session.accuracy(),
            mistakes: self.session.mistakes().len(),
            typed: self.session.typed_len(),
        };
        debug!(tempo = result.tempo, accuracy = result.accuracy, "script complete");
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(engine: &mut TypingEngine, text: &str, now: Timestamp) -> Vec<StageEvent> {
        text.chars()
            .flat_map(|c| engine.on_key(Key::Char(c), false, now))
            .collect()
    }

    #[test]
    fn correct_and_incorrect_keystrokes() {
        let mut engine = TypingEngine::new("abc");
        let events = engine.on_key(Key::Char('a'), false, 0);
        assert_eq!(events, vec![StageEvent::KeystrokeRecorded { correct: true, index: 0 }]);
        let events = engine.on_key(Key::Char('x'), false, 10);
        assert_eq!(events, vec![StageEvent::KeystrokeRecorded { correct: false, index: 1 }]);
        assert!(engine.session().is_mistake(1));
    }

    #[test]
    fn backspace_emits_nothing() {
        let mut engine = TypingEngine::new("hello");
        type_str(&mut engine, "hel", 0);
        for _ in 0..3 {
            assert!(engine.on_key(Key::Backspace, false, 0).is_empty());
        }
        assert_eq!(engine.session().cursor(), 0);
        assert!(engine.on_key(Key::Backspace, false, 0).is_empty());
    }

    #[test]
    fn ignored_keys_change_nothing() {
        let mut engine = TypingEngine::new("abc");
        assert!(engine.on_key(Key::Other, false, 0).is_empty());
        assert!(engine.on_key(Key::Char('a'), true, 0).is_empty());
        assert_eq!(engine.session().cursor(), 0);
    }

    #[test]
    fn paused_engine_is_inert() {
        let mut engine = TypingEngine::new("abc");
        engine.set_paused(true);
        assert!(engine.on_key(Key::Char('a'), false, 0).is_empty());
        engine.set_paused(false);
        assert_eq!(engine.on_key(Key::Char('a'), false, 0).len(), 1);
    }

    #[test]
    fn completion_fires_once() {
        let mut engine = TypingEngine::new("hi");
        let events = type_str(&mut engine, "hi", 0);
        let completions = events
            .iter()
            .filter(|e| matches!(e, StageEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
        assert!(engine.has_completed());
        assert_eq!(engine.take_completion(0), None);
        assert!(type_str(&mut engine, "x", 0).is_empty());
    }

    #[test]
    fn double_space_triggers_panic_without_advancing() {
        let mut engine = TypingEngine::new("a  b");
        type_str(&mut engine, "a", 0);
        let first = engine.on_key(Key::Char(' '), false, 1_000);
        assert_eq!(first, vec![StageEvent::KeystrokeRecorded { correct: true, index: 1 }]);
        let second = engine.on_key(Key::Char(' '), false, 1_299);
        assert_eq!(second, vec![StageEvent::PanicTriggered]);
        assert_eq!(engine.session().cursor(), 2);

        // tracker was reset, so a third quick tap is an ordinary space
        let third = engine.on_key(Key::Char(' '), false, 1_350);
        assert_eq!(third, vec![StageEvent::KeystrokeRecorded { correct: true, index: 2 }]);
    }

    #[test]
    fn slow_spaces_do_not_panic() {
        let mut engine = TypingEngine::new("  ");
        engine.on_key(Key::Char(' '), false, 1_000);
        let events = engine.on_key(Key::Char(' '), false, 1_301);
        assert!(!events.contains(&StageEvent::PanicTriggered));
        assert_eq!(engine.session().cursor(), 2);
    }

    #[test]
    fn tempo_updates_only_when_positive() {
        let mut engine = TypingEngine::new("abcdef");
        let early = engine.on_key(Key::Char('a'), false, 0);
        assert!(!early.iter().any(|e| matches!(e, StageEvent::TempoUpdated(_))));
        let late = engine.on_key(Key::Char('b'), false, 12_000);
        assert!(late.contains(&StageEvent::TempoUpdated(2.0)));
    }

    #[test]
    fn load_resets_latch_and_bumps_generation() {
        let mut engine = TypingEngine::new("a");
        type_str(&mut engine, "a", 0);
        assert!(engine.has_completed());
        let generation = engine.generation();
        engine.retry();
        assert!(!engine.has_completed());
        assert_eq!(engine.generation(), generation + 1);
        assert_eq!(engine.session().target_text(), "a");
        assert_eq!(engine.session().cursor(), 0);
    }
}

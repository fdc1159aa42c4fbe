use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A key as delivered by the host, independent of terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Other,
}

impl Key {
    /// Maps a DOM-style key name: a single character, `"Backspace"`, or
    /// anything else (`"Shift"`, `"ArrowLeft"`, ...) which is ignored.
    pub fn from_name(name: &str) -> Self {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Key::Char(c),
            _ if name == "Backspace" => Key::Backspace,
            _ => Key::Other,
        }
    }
}

impl From<&KeyEvent> for Key {
    fn from(event: &KeyEvent) -> Self {
        match event.code {
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Backspace => Key::Backspace,
            _ => Key::Other,
        }
    }
}

pub fn has_ctrl(event: &KeyEvent) -> bool {
    event.modifiers.contains(KeyModifiers::CONTROL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Type(char),
    Backspace,
    Ignore,
}

/// Decides what a keypress means to the typing engine. Control chords are
/// shortcuts for the host and never reach the script.
pub fn classify(key: Key, ctrl: bool) -> KeyAction {
    match key {
        _ if ctrl => KeyAction::Ignore,
        Key::Char(c) if !c.is_control() => KeyAction::Type(c),
        Key::Backspace => KeyAction::Backspace,
        _ => KeyAction::Ignore,
    }
}

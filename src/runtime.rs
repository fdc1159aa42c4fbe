use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind};
use tracing::debug;

use crate::clock::Clock;
use crate::keys::{has_ctrl, Key};
use crate::storage::KeyValueStore;
use crate::theatre::Theatre;

/// Everything the host loop reacts to.
#[derive(Clone, Debug)]
pub enum StageInput {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal input (keyboard, resize, etc.)
pub trait InputSource: Send + 'static {
    /// Block for up to `timeout` waiting for input.
    fn recv_timeout(&self, timeout: Duration) -> Result<StageInput, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread.
pub struct CrosstermInput {
    rx: Receiver<StageInput>,
}

impl CrosstermInput {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let input = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => StageInput::Key(key),
                Ok(CtEvent::Resize(_, _)) => StageInput::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(input).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for CrosstermInput {
    fn recv_timeout(&self, timeout: Duration) -> Result<StageInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed source for headless runs.
pub struct ChannelInput {
    rx: Receiver<StageInput>,
}

impl ChannelInput {
    pub fn new(rx: Receiver<StageInput>) -> Self {
        Self { rx }
    }
}

impl InputSource for ChannelInput {
    fn recv_timeout(&self, timeout: Duration) -> Result<StageInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the host one input or tick at a time.
pub struct Runner<E: InputSource> {
    source: E,
    tick: Duration,
}

impl<E: InputSource> Runner<E> {
    pub fn new(source: E, tick: Duration) -> Self {
        Self { source, tick }
    }

    /// Blocks up to one tick and returns the next input, or Tick on timeout
    pub fn step(&self) -> StageInput {
        match self.source.recv_timeout(self.tick) {
            Ok(input) => input,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => StageInput::Tick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Applies one input to the theatre. Ctrl chords are stage controls:
/// `r` retry, `p` pause, `s` sound, arrows move between exercises, `c`
/// quits. Esc quits.
pub fn handle_input<S: KeyValueStore, C: Clock>(
    theatre: &mut Theatre<S, C>,
    input: &StageInput,
) -> Flow {
    let key = match input {
        StageInput::Tick => {
            theatre.tick();
            return Flow::Continue;
        }
        StageInput::Resize => return Flow::Continue,
        StageInput::Key(key) => key,
    };

    if key.code == KeyCode::Esc {
        return Flow::Quit;
    }

    if has_ctrl(key) {
        match key.code {
            KeyCode::Char('c') => return Flow::Quit,
            KeyCode::Char('r') => theatre.retry(),
            KeyCode::Char('p') => {
                let paused = theatre.toggle_pause();
                debug!(paused, "pause toggled");
            }
            KeyCode::Char('s') => theatre.toggle_sound(),
            KeyCode::Right => theatre.advance(),
            KeyCode::Left => {
                theatre.previous();
            }
            _ => {}
        }
        return Flow::Continue;
    }

    // The first key after the curtains close only raises them.
    if !theatre.state().production.curtains_open {
        theatre.raise_curtain();
        return Flow::Continue;
    }
    theatre.on_key(Key::from(key), false);
    Flow::Continue
}

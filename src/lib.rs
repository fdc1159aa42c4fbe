// Library surface for the terminal host and the integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod critics;
pub mod engine;
pub mod error;
pub mod keys;
pub mod logging;
pub mod pass;
pub mod persistence;
pub mod runtime;
pub mod scripts;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod theatre;
pub mod timers;
pub mod ui;
pub mod util;

pub use engine::{StageEvent, TypingEngine};
pub use state::SessionState;
pub use store::{reduce, Event, Store};
pub use theatre::Theatre;

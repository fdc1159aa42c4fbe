use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};
use tracing::{info, warn};

use typecast::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    pass::PassSnapshot,
    runtime::{handle_input, CrosstermInput, Flow, Runner},
    scripts::Act,
    state::{RoleId, SettingsPatch},
    storage::{KeyValueStore, SqliteStore},
    theatre::Theatre,
    ui::Stage,
};

const TICK_RATE_MS: u64 = 100;

/// a theatrical touch-typing tutor
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A touch-typing tutor staged as a theatre production: pick a role, type your scripts, and earn reviews from the critics."
)]
pub struct Cli {
    /// custom script to perform instead of Act I
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// role to play (confident-executive, rising-star, method-actor)
    #[clap(short = 'r', long)]
    role: Option<RoleId>,

    /// stage name
    #[clap(short = 'n', long)]
    name: Option<String>,

    /// continuation code of a saved session to resume
    #[clap(short = 'c', long)]
    code: Option<String>,

    /// print a backstage pass for the current progress and exit
    #[clap(long)]
    pass: bool,

    /// redeem a backstage pass into your progress and print its contents
    #[clap(long, value_name = "PASS")]
    redeem: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = AppDirs::log_path() {
        logging::init(&path)?;
    }

    let config_store = FileConfigStore::new();
    let config = config_store.load();
    info!(path = %config_store.path().display(), "config loaded");

    let act = match cli.prompt.as_deref() {
        Some(prompt) if !prompt.trim().is_empty() => Act::single(prompt),
        _ => Act::act_one()?,
    };
    let mut theatre = Theatre::new(open_storage()?, SystemClock, act);
    prepare(&mut theatre, &cli, &config)?;

    if let Some(pass) = cli.redeem.as_deref() {
        let snapshot = redeem(&mut theatre, pass)?;
        remember(&config_store, config, &theatre);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        if let Some(code) = theatre.state().actor.continuation_code.as_deref() {
            println!("Performance restored! Break a leg! Continue with --code {code}");
        }
        return Ok(());
    }

    if cli.pass {
        let pass = theatre.issue_pass()?;
        theatre.flush()?;
        println!("{pass}");
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut theatre);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    theatre.flush()?;
    remember(&config_store, config, &theatre);

    result
}

fn open_storage() -> Result<SqliteStore, Box<dyn Error>> {
    let storage = match AppDirs::db_path() {
        Some(path) => SqliteStore::open(path)?,
        None => {
            warn!("no state directory, progress will not be kept");
            SqliteStore::open_in_memory()?
        }
    };
    Ok(storage)
}

/// Applies saved preferences, then the command line, to a fresh theatre.
fn prepare<S: KeyValueStore, C: Clock>(
    theatre: &mut Theatre<S, C>,
    cli: &Cli,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    theatre.sweep();
    theatre.update_settings(SettingsPatch::from(&config.theatre));

    if let Some(code) = cli.code.as_deref() {
        theatre.resume(code)?;
    } else if let Some(code) = config.last_code.as_deref() {
        if let Err(e) = theatre.resume(code) {
            info!(%code, error = %e, "previous session not resumed");
        }
    }

    let role = cli
        .role
        .or(theatre.state().actor.role)
        .or(config.default_role);
    if let Some(role) = role {
        let name = cli.name.clone().or_else(|| {
            theatre
                .state()
                .actor
                .role
                .is_none()
                .then(|| config.default_name.clone())
                .flatten()
        });
        theatre.set_role(role, name);
    }
    Ok(())
}

/// Takes over the progress carried by `pass` and saves it straight away.
fn redeem<S: KeyValueStore, C: Clock>(
    theatre: &mut Theatre<S, C>,
    pass: &str,
) -> Result<PassSnapshot, Box<dyn Error>> {
    let snapshot = theatre.redeem_pass(pass)?;
    theatre.flush()?;
    Ok(snapshot)
}

fn remember<S: KeyValueStore, C: Clock>(
    store: &FileConfigStore,
    mut config: Config,
    theatre: &Theatre<S, C>,
) {
    let state = theatre.state();
    config.theatre = state.theatre.clone();
    if state.actor.continuation_code.is_some() {
        config.last_code = state.actor.continuation_code.clone();
    }
    if let Err(e) = store.save(&config) {
        warn!(error = %e, "failed to save config");
    }
}

fn start_tui<B: Backend, S: KeyValueStore, C: Clock>(
    terminal: &mut Terminal<B>,
    theatre: &mut Theatre<S, C>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermInput::new(), Duration::from_millis(TICK_RATE_MS));

    loop {
        terminal.draw(|f| f.render_widget(Stage::new(theatre), f.area()))?;

        if handle_input(theatre, &runner.step()) == Flow::Quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use typecast::clock::ManualClock;
    use typecast::storage::MemoryStore;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["typecast"]).unwrap();
        assert_eq!(cli.prompt, None);
        assert_eq!(cli.role, None);
        assert!(!cli.pass);
        assert_eq!(cli.redeem, None);
    }

    #[test]
    fn test_cli_role_names() {
        let cli = Cli::try_parse_from(["typecast", "--role", "method-actor", "-n", "Ada"]).unwrap();
        assert_eq!(cli.role, Some(RoleId::MethodActor));
        assert_eq!(cli.name.as_deref(), Some("Ada"));

        assert!(Cli::try_parse_from(["typecast", "--role", "stagehand"]).is_err());
    }

    #[test]
    fn test_cli_codes() {
        let cli = Cli::try_parse_from([
            "typecast",
            "--code",
            "RISI-1234-SHOW-AB12",
            "--redeem",
            "STAR-EYJ2-SHOW-IJOI",
        ])
        .unwrap();
        assert_eq!(cli.code.as_deref(), Some("RISI-1234-SHOW-AB12"));
        assert_eq!(cli.redeem.as_deref(), Some("STAR-EYJ2-SHOW-IJOI"));
    }

    #[test]
    fn test_prepare_uses_config_defaults() {
        let clock = ManualClock::new(0);
        let mut theatre = Theatre::new(MemoryStore::new(), &clock, Act::single("hi"));
        let cli = Cli::try_parse_from(["typecast"]).unwrap();
        let config = Config {
            default_name: Some("Ada".into()),
            default_role: Some(RoleId::RisingStar),
            ..Config::default()
        };
        prepare(&mut theatre, &cli, &config).unwrap();
        assert_eq!(theatre.state().actor.role, Some(RoleId::RisingStar));
        assert_eq!(theatre.state().actor.name, "Ada");
        assert!(theatre.state().actor.continuation_code.is_some());
    }

    #[test]
    fn test_prepare_rejects_unknown_code() {
        let clock = ManualClock::new(0);
        let mut theatre = Theatre::new(MemoryStore::new(), &clock, Act::single("hi"));
        let cli = Cli::try_parse_from(["typecast", "--code", "NOPE-0000-SHOW-0000"]).unwrap();
        let err = prepare(&mut theatre, &cli, &Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid code or expired session.");
    }

    #[test]
    fn test_prepare_ignores_stale_last_code() {
        let clock = ManualClock::new(0);
        let mut theatre = Theatre::new(MemoryStore::new(), &clock, Act::single("hi"));
        let cli = Cli::try_parse_from(["typecast"]).unwrap();
        let config = Config {
            last_code: Some("GONE-0000-SHOW-0000".into()),
            ..Config::default()
        };
        prepare(&mut theatre, &cli, &config).unwrap();
        assert_eq!(theatre.state().actor.role, None);
    }

    #[test]
    fn test_redeem_saves_progress() {
        let clock = ManualClock::new(0);
        let mut storage = MemoryStore::new();
        let mut state = typecast::SessionState::default();
        state.actor.role = Some(RoleId::RisingStar);
        state.actor.repertoire = vec!["improv-custom".into()];
        let pass = typecast::pass::BackstagePass::new(&mut storage)
            .generate(&PassSnapshot::from_state(&state, 0), typecast::pass::Tier::Understudy)
            .unwrap();

        let mut theatre = Theatre::new(storage, &clock, Act::single("hi"));
        let snapshot = redeem(&mut theatre, &pass).unwrap();
        assert_eq!(snapshot.show_count, 1);

        let code = theatre.state().actor.continuation_code.clone().unwrap();
        let saved = typecast::persistence::restore(theatre.storage(), &code).unwrap();
        assert_eq!(saved.actor.role, Some(RoleId::RisingStar));
        assert_eq!(saved.actor.repertoire, vec!["improv-custom"]);

        assert!(redeem(&mut theatre, "LEGEND-0000-SHOW-0000").is_err());
    }
}

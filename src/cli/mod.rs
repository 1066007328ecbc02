use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::session::SessionStore;

pub mod commands;

use self::commands::{DeleteArgs, ListArgs, LoginArgs, NewArgs};

#[derive(Parser, Debug)]
#[command(
    name = "notewall",
    version,
    about = "Terminal note board with replies, tags and bulk selection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTEWALL_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NOTEWALL_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive board (default)
    Tui,
    /// Post a note, optionally as a reply
    New(NewArgs),
    /// Print the newest page(s) of notes
    List(ListArgs),
    /// Delete a note by id
    Delete(DeleteArgs),
    /// Sign in to the notes service and remember the session
    Login(LoginArgs),
    /// Forget the saved session
    Logout,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NOTEWALL_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("NOTEWALL_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    // The board owns the terminal, so its logs go to a file.
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_file());
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = Arc::new(loader.load_or_init()?);
    let session = SessionStore::new(paths.session_file());
    tracing::debug!(backend = ?config.backend.kind, "configuration loaded");

    match command {
        Commands::Tui => commands::run_tui(config, session),
        Commands::New(args) => commands::new_note(&config, &session, args),
        Commands::List(args) => commands::list_notes(&config, &session, args),
        Commands::Delete(args) => commands::delete_note(&config, &session, args),
        Commands::Login(args) => commands::login(&config, &session, args),
        Commands::Logout => commands::logout(&session),
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

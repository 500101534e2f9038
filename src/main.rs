//! Color Chain: clear chains of same-coloured tiles against the clock, in the terminal.

mod app;
mod chain;
mod config;
mod event;
mod game;
mod grid;
mod highscores;
mod input;
mod logging;
mod powerup;
mod score;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppOptions};
use clap::{Parser, ValueEnum};
use config::{ConfigError, GameConfig};
use game::Game;
use highscores::FileHighScores;
use std::path::PathBuf;
use theme::Theme;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();
    let dir = config::app_dir();

    let mut config = GameConfig::load(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;
    args.apply(&mut config)?;

    if !args.no_log {
        let path = args
            .log_file
            .clone()
            .unwrap_or_else(|| logging::default_path(&dir));
        logging::init(&path)?;
    }
    info!(?config, "starting colorchain");

    let theme = Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        warn!(%err, "theme not loaded; using One Dark");
        let mut theme = Theme::default();
        theme.apply_palette(args.palette);
        theme
    });

    let store = FileHighScores::in_dir(&dir);
    info!(path = %store.path().display(), "high score file");
    let mut game = Game::new(config, Box::new(store));
    if args.reset_high_score {
        game.score_mut().reset_high_score();
    }

    let mut app = App::new(
        game,
        theme,
        AppOptions {
            frame_rate: args.frame_rate,
            no_animation: args.no_animation,
            no_menu: args.no_menu,
        },
    )?;
    app.run()
}

/// Clear chains of touching same-coloured tiles before the clock runs out.
#[derive(Debug, Parser)]
#[command(
    name = "colorchain",
    version,
    about = "Clear chains of touching same-coloured tiles before the clock runs out.",
    long_about = "Color Chain is a timed tile puzzle for the terminal.\n\n\
        Select a tile to clear it together with every touching tile of the same colour \
        (at least two). Bigger chains score exponentially more and fill the power meter; \
        a full meter grants a random power-up: colour converter, bonus time or a score \
        multiplier. Cleared tiles refill after a short delay.\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor   Enter / Space / click  Select\n  \
        P  Pause   R  Restart   M  Menu   Q / Esc  Quit\n\n\
        Tuning values can be set in a TOML file (--config); CLI flags override it."
)]
pub struct Args {
    /// TOML tuning file ([grid], [score], [power_up], [session]).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Board width in tiles.
    #[arg(long, value_name = "COLS")]
    pub width: Option<usize>,

    /// Board height in tiles.
    #[arg(long, value_name = "ROWS")]
    pub height: Option<usize>,

    /// Session length in seconds.
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<f64>,

    /// Smallest chain that clears.
    #[arg(long, value_name = "N")]
    pub min_chain: Option<usize>,

    /// Seed for reproducible boards and power-ups.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Disable fades; state changes happen immediately.
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Set the stored high score back to zero before playing.
    #[arg(long)]
    pub reset_high_score: bool,

    /// Log file (default: colorchain.log in the config directory).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not write a log file.
    #[arg(long, conflicts_with = "log_file")]
    pub no_log: bool,
}

impl Args {
    /// Apply CLI overrides on top of file values, then re-validate.
    fn apply(&self, config: &mut GameConfig) -> Result<(), ConfigError> {
        if let Some(width) = self.width {
            config.grid.width = width;
        }
        if let Some(height) = self.height {
            config.grid.height = height;
        }
        if let Some(min_chain) = self.min_chain {
            config.grid.min_chain = min_chain;
        }
        if let Some(secs) = self.time_limit {
            config.session.time_limit = config::secs("--time-limit", secs)?;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

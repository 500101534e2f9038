//! Tuning configuration.
//!
//! Reads an optional TOML file; every key falls back to the built-in default,
//! so a file only needs the values it changes. CLI flags are applied on top
//! in `main`.

use crate::chain::DEFAULT_MIN_CHAIN;
use crate::grid::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::powerup::PowerUpConfig;
use crate::score::{BASE_POINTS, CHAIN_MULTIPLIER, ScoreConfig};
use crate::session::TIME_LIMIT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Delay between clearing a chain and refilling its tiles.
pub const REGENERATION_DELAY: Duration = Duration::from_secs(1);

/// Largest board side; keeps the drawn board within terminal coordinates.
pub const MAX_GRID_SIDE: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub score: ScoreConfig,
    pub power_up: PowerUpConfig,
    pub session: SessionConfig,
    /// Fixed RNG seed for reproducible boards; OS entropy when `None`.
    pub seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    pub min_chain: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub time_limit: Duration,
    pub regeneration_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                min_chain: DEFAULT_MIN_CHAIN,
            },
            score: ScoreConfig::default(),
            power_up: PowerUpConfig::default(),
            session: SessionConfig {
                time_limit: TIME_LIMIT,
                regeneration_delay: REGENERATION_DELAY,
            },
            seed: None,
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    grid: TomlGrid,
    #[serde(default)]
    score: TomlScore,
    #[serde(default)]
    power_up: TomlPowerUp,
    #[serde(default)]
    session: TomlSession,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlGrid {
    #[serde(default = "default_width")]
    width: usize,
    #[serde(default = "default_height")]
    height: usize,
    #[serde(default = "default_min_chain")]
    min_chain: usize,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlScore {
    #[serde(default = "default_base_points")]
    base_points: f64,
    #[serde(default = "default_chain_multiplier")]
    chain_multiplier: f64,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlPowerUp {
    #[serde(default = "default_small_fill")]
    small_fill: f32,
    #[serde(default = "default_medium_fill")]
    medium_fill: f32,
    #[serde(default = "default_large_fill")]
    large_fill: f32,
    #[serde(default = "default_huge_fill")]
    huge_fill: f32,
    #[serde(default = "default_time_bonus_secs")]
    time_bonus_secs: f64,
    #[serde(default = "default_multiplier_secs")]
    multiplier_secs: f64,
    #[serde(default = "default_multiplier_amount")]
    multiplier_amount: f32,
    #[serde(default = "default_color_converter_weight")]
    color_converter_weight: u32,
    #[serde(default = "default_time_bonus_weight")]
    time_bonus_weight: u32,
    #[serde(default = "default_score_multiplier_weight")]
    score_multiplier_weight: u32,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlSession {
    #[serde(default = "default_time_limit_secs")]
    time_limit_secs: f64,
    #[serde(default = "default_regeneration_delay_secs")]
    regeneration_delay_secs: f64,
}

// ── Defaults ──

fn default_width() -> usize { DEFAULT_WIDTH }
fn default_height() -> usize { DEFAULT_HEIGHT }
fn default_min_chain() -> usize { DEFAULT_MIN_CHAIN }
fn default_base_points() -> f64 { BASE_POINTS }
fn default_chain_multiplier() -> f64 { CHAIN_MULTIPLIER }
fn default_small_fill() -> f32 { PowerUpConfig::default().small_fill }
fn default_medium_fill() -> f32 { PowerUpConfig::default().medium_fill }
fn default_large_fill() -> f32 { PowerUpConfig::default().large_fill }
fn default_huge_fill() -> f32 { PowerUpConfig::default().huge_fill }
fn default_time_bonus_secs() -> f64 { PowerUpConfig::default().time_bonus.as_secs_f64() }
fn default_multiplier_secs() -> f64 { PowerUpConfig::default().multiplier_duration.as_secs_f64() }
fn default_multiplier_amount() -> f32 { PowerUpConfig::default().multiplier_amount }
fn default_color_converter_weight() -> u32 { PowerUpConfig::default().color_converter_weight }
fn default_time_bonus_weight() -> u32 { PowerUpConfig::default().time_bonus_weight }
fn default_score_multiplier_weight() -> u32 { PowerUpConfig::default().score_multiplier_weight }
fn default_time_limit_secs() -> f64 { TIME_LIMIT.as_secs_f64() }
fn default_regeneration_delay_secs() -> f64 { REGENERATION_DELAY.as_secs_f64() }

impl Default for TomlGrid {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            min_chain: default_min_chain(),
        }
    }
}

impl Default for TomlScore {
    fn default() -> Self {
        Self {
            base_points: default_base_points(),
            chain_multiplier: default_chain_multiplier(),
        }
    }
}

impl Default for TomlPowerUp {
    fn default() -> Self {
        Self {
            small_fill: default_small_fill(),
            medium_fill: default_medium_fill(),
            large_fill: default_large_fill(),
            huge_fill: default_huge_fill(),
            time_bonus_secs: default_time_bonus_secs(),
            multiplier_secs: default_multiplier_secs(),
            multiplier_amount: default_multiplier_amount(),
            color_converter_weight: default_color_converter_weight(),
            time_bonus_weight: default_time_bonus_weight(),
            score_multiplier_weight: default_score_multiplier_weight(),
        }
    }
}

impl Default for TomlSession {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
            regeneration_delay_secs: default_regeneration_delay_secs(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Defaults when `path` is `None`; otherwise the file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: TomlConfig = toml::from_str(text)?;
        let config = Self {
            grid: GridConfig {
                width: raw.grid.width,
                height: raw.grid.height,
                min_chain: raw.grid.min_chain,
            },
            score: ScoreConfig {
                base_points: raw.score.base_points,
                chain_multiplier: raw.score.chain_multiplier,
            },
            power_up: PowerUpConfig {
                small_fill: raw.power_up.small_fill,
                medium_fill: raw.power_up.medium_fill,
                large_fill: raw.power_up.large_fill,
                huge_fill: raw.power_up.huge_fill,
                time_bonus: secs("power_up.time_bonus_secs", raw.power_up.time_bonus_secs)?,
                multiplier_duration: secs(
                    "power_up.multiplier_secs",
                    raw.power_up.multiplier_secs,
                )?,
                multiplier_amount: raw.power_up.multiplier_amount,
                color_converter_weight: raw.power_up.color_converter_weight,
                time_bonus_weight: raw.power_up.time_bonus_weight,
                score_multiplier_weight: raw.power_up.score_multiplier_weight,
            },
            session: SessionConfig {
                time_limit: secs("session.time_limit_secs", raw.session.time_limit_secs)?,
                regeneration_delay: secs(
                    "session.regeneration_delay_secs",
                    raw.session.regeneration_delay_secs,
                )?,
            },
            seed: raw.seed,
        };
        config.validate()?;
        Ok(config)
    }

    /// Range checks shared by file and CLI values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                key,
                reason: reason.into(),
            }
        }
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(invalid("grid", "width and height must be at least 1"));
        }
        if self.grid.width > MAX_GRID_SIDE || self.grid.height > MAX_GRID_SIDE {
            return Err(invalid(
                "grid",
                format!("width and height must be at most {MAX_GRID_SIDE}"),
            ));
        }
        if self.grid.min_chain == 0 {
            return Err(invalid("grid.min_chain", "must be at least 1"));
        }
        if !(self.score.base_points.is_finite() && self.score.base_points >= 0.0) {
            return Err(invalid("score.base_points", "must be a non-negative number"));
        }
        if !(self.score.chain_multiplier.is_finite() && self.score.chain_multiplier > 0.0) {
            return Err(invalid("score.chain_multiplier", "must be greater than 0"));
        }
        let p = &self.power_up;
        for (key, fill) in [
            ("power_up.small_fill", p.small_fill),
            ("power_up.medium_fill", p.medium_fill),
            ("power_up.large_fill", p.large_fill),
            ("power_up.huge_fill", p.huge_fill),
        ] {
            if !(fill.is_finite() && fill >= 0.0) {
                return Err(invalid(key, "must be a non-negative number"));
            }
        }
        if !(p.multiplier_amount.is_finite() && p.multiplier_amount > 0.0) {
            return Err(invalid("power_up.multiplier_amount", "must be greater than 0"));
        }
        if self.session.time_limit.is_zero() {
            return Err(invalid("session.time_limit_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Seconds (float) to Duration, rejecting negative or non-finite values.
pub fn secs(key: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

/// Per-user directory for the high score and log (XDG config dir or ~/.config/colorchain).
pub fn app_dir() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("colorchain")
}

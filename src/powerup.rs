//! Power meter: chain sizes fill a bar; a full bar picks a weighted-random power-up.

use crate::event::GameEvent;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Meter capacity.
pub const MAX_POWER: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    /// Recolour the most common colour to the second most common.
    ColorConverter,
    /// Extra seconds on the clock.
    TimeBonus,
    /// Chain sizes scaled for a short window.
    ScoreMultiplier,
}

impl PowerUpKind {
    /// Selection order for the cumulative weight bands.
    pub const ALL: [Self; 3] = [Self::ColorConverter, Self::TimeBonus, Self::ScoreMultiplier];

    pub fn label(self) -> &'static str {
        match self {
            Self::ColorConverter => "Color Converter",
            Self::TimeBonus => "Time Bonus",
            Self::ScoreMultiplier => "Score Multiplier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerUpConfig {
    /// Fill for chains of 2–3 tiles.
    pub small_fill: f32,
    /// 4–5 tiles.
    pub medium_fill: f32,
    /// 6–7 tiles.
    pub large_fill: f32,
    /// 8+ tiles.
    pub huge_fill: f32,
    pub time_bonus: Duration,
    pub multiplier_duration: Duration,
    pub multiplier_amount: f32,
    pub color_converter_weight: u32,
    pub time_bonus_weight: u32,
    pub score_multiplier_weight: u32,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            small_fill: 10.0,
            medium_fill: 25.0,
            large_fill: 40.0,
            huge_fill: 60.0,
            time_bonus: Duration::from_secs(10),
            multiplier_duration: Duration::from_secs(5),
            multiplier_amount: 2.0,
            color_converter_weight: 30,
            time_bonus_weight: 40,
            score_multiplier_weight: 30,
        }
    }
}

impl PowerUpConfig {
    /// Fill amount for a chain size; 0 below two tiles.
    pub fn fill_for(&self, chain_size: usize) -> f32 {
        match chain_size {
            0 | 1 => 0.0,
            2 | 3 => self.small_fill,
            4 | 5 => self.medium_fill,
            6 | 7 => self.large_fill,
            _ => self.huge_fill,
        }
    }

    pub fn weight(&self, kind: PowerUpKind) -> u32 {
        match kind {
            PowerUpKind::ColorConverter => self.color_converter_weight,
            PowerUpKind::TimeBonus => self.time_bonus_weight,
            PowerUpKind::ScoreMultiplier => self.score_multiplier_weight,
        }
    }

    pub fn total_weight(&self) -> u32 {
        PowerUpKind::ALL
            .iter()
            .fold(0u32, |acc, &k| acc.saturating_add(self.weight(k)))
    }
}

/// A selected power-up that has not been applied yet. Handing it back to
/// [`PowerUpEngine::consume`] is what empties the bar.
#[must_use = "consume the activation or the meter stays full"]
#[derive(Debug, PartialEq, Eq)]
pub struct PowerUpActivation {
    kind: PowerUpKind,
}

#[derive(Debug, Clone)]
pub struct PowerUpEngine {
    config: PowerUpConfig,
    /// Visible meter, 0..=MAX_POWER.
    meter: f32,
    /// Progress past a full meter, kept for the next cycle.
    carry: f32,
    /// Full and waiting for consume/reset; no further selection until then.
    full: bool,
}

impl PowerUpEngine {
    pub fn new(config: PowerUpConfig) -> Self {
        Self {
            config,
            meter: 0.0,
            carry: 0.0,
            full: false,
        }
    }

    pub fn config(&self) -> &PowerUpConfig {
        &self.config
    }

    pub fn meter(&self) -> f32 {
        self.meter
    }

    #[cfg(test)]
    /// Meter plus carried overflow.
    pub fn total_progress(&self) -> f32 {
        self.meter + self.carry
    }

    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Feed one chain. Returns an activation when this call fills the bar.
    pub fn add_progress(
        &mut self,
        chain_size: usize,
        rng: &mut impl Rng,
        events: &mut Vec<GameEvent>,
    ) -> Option<PowerUpActivation> {
        let fill = self.config.fill_for(chain_size);
        if fill <= 0.0 {
            return None;
        }
        if self.full {
            self.carry += fill;
            return None;
        }

        let total = self.meter + fill;
        self.meter = total.min(MAX_POWER);
        self.carry += total - self.meter;
        events.push(GameEvent::PowerMeterChanged(self.meter));

        if self.meter < MAX_POWER {
            return None;
        }
        self.full = true;
        match self.select(rng) {
            Some(kind) => {
                info!(?kind, "power-up selected");
                events.push(GameEvent::PowerUpActivated(kind));
                Some(PowerUpActivation { kind })
            }
            None => {
                warn!("power-up weights sum to zero; skipping activation");
                self.reset_power_bar();
                events.push(GameEvent::PowerMeterChanged(self.meter));
                None
            }
        }
    }

    /// Apply-side of an activation: empties one bar's worth and returns the kind.
    pub fn consume(&mut self, activation: PowerUpActivation) -> PowerUpKind {
        self.reset_power_bar();
        activation.kind
    }

    /// Take exactly one full bar off meter+carry; anything beyond carries forward.
    pub fn reset_power_bar(&mut self) {
        let remaining = (self.meter + self.carry - MAX_POWER).max(0.0);
        self.meter = remaining.min(MAX_POWER);
        self.carry = remaining - self.meter;
        self.full = false;
    }

    /// Empty everything (new session).
    pub fn reset(&mut self) {
        self.meter = 0.0;
        self.carry = 0.0;
        self.full = false;
    }

    /// Weighted pick over [`PowerUpKind::ALL`]; `None` when all weights are zero.
    pub fn select(&self, rng: &mut impl Rng) -> Option<PowerUpKind> {
        let total = self.config.total_weight();
        if total == 0 {
            return None;
        }
        let roll = rng.random_range(0..total);
        let mut upper = 0u32;
        for kind in PowerUpKind::ALL {
            upper = upper.saturating_add(self.config.weight(kind));
            if roll < upper {
                return Some(kind);
            }
        }
        None
    }
}

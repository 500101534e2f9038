//! Chain scoring: exponential chain bonus, running score, persisted high score.

use crate::event::GameEvent;
use tracing::{debug, info, warn};

/// Base points per tile.
pub const BASE_POINTS: f64 = 100.0;
/// Per-extra-tile growth factor.
pub const CHAIN_MULTIPLIER: f64 = 1.5;

/// Where the high score lives between runs.
pub trait HighScoreStore {
    fn load(&self) -> u64;
    fn save(&mut self, high_score: u64) -> anyhow::Result<()>;
}

/// In-process store; nothing survives the process.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryHighScores {
    pub value: u64,
    pub saves: u32,
}

#[cfg(test)]
impl HighScoreStore for MemoryHighScores {
    fn load(&self) -> u64 {
        self.value
    }

    fn save(&mut self, high_score: u64) -> anyhow::Result<()> {
        self.value = high_score;
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreConfig {
    pub base_points: f64,
    pub chain_multiplier: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            base_points: BASE_POINTS,
            chain_multiplier: CHAIN_MULTIPLIER,
        }
    }
}

pub struct ScoreEngine {
    config: ScoreConfig,
    store: Box<dyn HighScoreStore>,
    current: u64,
    high: u64,
    last_chain: u64,
    chain_count: u32,
}

impl std::fmt::Debug for ScoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreEngine")
            .field("config", &self.config)
            .field("current", &self.current)
            .field("high", &self.high)
            .field("last_chain", &self.last_chain)
            .field("chain_count", &self.chain_count)
            .finish_non_exhaustive()
    }
}

impl ScoreEngine {
    /// Loads the high score from `store`; current score starts at zero.
    pub fn new(config: ScoreConfig, store: Box<dyn HighScoreStore>) -> Self {
        let high = store.load();
        Self {
            config,
            store,
            current: 0,
            high,
            last_chain: 0,
            chain_count: 0,
        }
    }

    pub fn current_score(&self) -> u64 {
        self.current
    }

    pub fn high_score(&self) -> u64 {
        self.high
    }

    #[cfg(test)]
    pub fn last_chain_score(&self) -> u64 {
        self.last_chain
    }

    pub fn chain_count(&self) -> u32 {
        self.chain_count
    }

    /// `multiplier^(chain_size - 1)`.
    pub fn multiplier_for(&self, chain_size: usize) -> f64 {
        if chain_size == 0 {
            return 0.0;
        }
        self.config
            .chain_multiplier
            .powi(chain_size.saturating_sub(1).min(i32::MAX as usize) as i32)
    }

    /// Points for a chain: `round(base × size × multiplier^(size-1))`, ties to even.
    /// Saturates at `u64::MAX` for absurd sizes.
    pub fn calculate(&self, chain_size: usize) -> u64 {
        if chain_size == 0 {
            return 0;
        }
        let raw = self.config.base_points * chain_size as f64 * self.multiplier_for(chain_size);
        raw.round_ties_even() as u64
    }

    /// Score a chain. No-op (returns `None`) for size 0.
    pub fn add_chain_score(&mut self, chain_size: usize, events: &mut Vec<GameEvent>) -> Option<u64> {
        if chain_size == 0 {
            return None;
        }
        let points = self.calculate(chain_size);
        self.last_chain = points;
        self.current = self.current.saturating_add(points);
        self.chain_count += 1;

        events.push(GameEvent::ChainScored { chain_size, points });
        events.push(GameEvent::ScoreChanged(self.current));

        if self.current > self.high {
            self.high = self.current;
            events.push(GameEvent::HighScoreBeaten(self.high));
            self.persist();
        }
        debug!(chain_size, points, total = self.current, "chain scored");
        Some(points)
    }

    /// Zero the running score; the high score stays.
    pub fn reset_current_score(&mut self, events: &mut Vec<GameEvent>) {
        self.current = 0;
        self.last_chain = 0;
        self.chain_count = 0;
        events.push(GameEvent::ScoreChanged(0));
    }

    pub fn reset_high_score(&mut self) {
        self.high = 0;
        self.persist();
        info!("high score reset");
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(self.high) {
            warn!(error = %e, high_score = self.high, "could not save high score");
        }
    }
}

/// Compact score text: 999, 1.5K, 12M, 2.1B, 3T. Whole values drop the decimal.
pub fn format_score(score: u64) -> String {
    const SUFFIXES: [(u64, &str); 4] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];
    for (divisor, suffix) in SUFFIXES {
        if score >= divisor {
            let value = score as f64 / divisor as f64;
            return if value - value.floor() < 0.01 {
                format!("{}{}", value.floor() as u64, suffix)
            } else {
                format!("{:.1}{}", value, suffix)
            };
        }
    }
    score.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl HighScoreStore for FailingStore {
        fn load(&self) -> u64 {
            500
        }
        fn save(&mut self, _high_score: u64) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn engine() -> ScoreEngine {
        ScoreEngine::new(ScoreConfig::default(), Box::new(MemoryHighScores::default()))
    }

    #[test]
    fn test_formula_exact_values() {
        let e = engine();
        assert_eq!(e.calculate(1), 100);
        assert_eq!(e.calculate(2), 300);
        assert_eq!(e.calculate(3), 675);
        assert_eq!(e.calculate(5), 2531);
    }

    #[test]
    fn test_add_chain_updates_state_and_events() {
        let mut e = engine();
        let mut events = Vec::new();
        assert_eq!(e.add_chain_score(3, &mut events), Some(675));
        assert_eq!(e.current_score(), 675);
        assert_eq!(e.last_chain_score(), 675);
        assert_eq!(e.chain_count(), 1);
        assert_eq!(
            events,
            vec![
                GameEvent::ChainScored {
                    chain_size: 3,
                    points: 675
                },
                GameEvent::ScoreChanged(675),
                GameEvent::HighScoreBeaten(675),
            ]
        );
    }

    #[test]
    fn test_zero_chain_is_noop() {
        let mut e = engine();
        let mut events = Vec::new();
        assert_eq!(e.add_chain_score(0, &mut events), None);
        assert_eq!(e.current_score(), 0);
        assert_eq!(e.chain_count(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_score_strictly_increases() {
        let mut e = engine();
        let mut events = Vec::new();
        let mut last = 0;
        for size in 1..=12 {
            e.add_chain_score(size, &mut events);
            assert!(e.current_score() > last);
            last = e.current_score();
        }
    }

    #[test]
    fn test_high_score_survives_reset() {
        let mut e = engine();
        let mut events = Vec::new();
        e.add_chain_score(5, &mut events);
        e.reset_current_score(&mut events);
        assert_eq!(e.current_score(), 0);
        assert_eq!(e.chain_count(), 0);
        assert_eq!(e.high_score(), 2531);
    }

    #[test]
    fn test_high_score_beaten_only_when_exceeded() {
        let store = MemoryHighScores {
            value: 1000,
            saves: 0,
        };
        let mut e = ScoreEngine::new(ScoreConfig::default(), Box::new(store));
        let mut events = Vec::new();
        e.add_chain_score(3, &mut events);
        assert!(!events.iter().any(|ev| matches!(ev, GameEvent::HighScoreBeaten(_))));
        assert_eq!(e.high_score(), 1000);
        e.add_chain_score(2, &mut events);
        assert_eq!(e.current_score(), 975);
        assert_eq!(e.high_score(), 1000);
        e.add_chain_score(2, &mut events);
        assert_eq!(e.high_score(), 1275);
        assert!(events.contains(&GameEvent::HighScoreBeaten(1275)));
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let mut e = ScoreEngine::new(ScoreConfig::default(), Box::new(FailingStore));
        assert_eq!(e.high_score(), 500);
        let mut events = Vec::new();
        e.add_chain_score(3, &mut events);
        assert_eq!(e.high_score(), 675);
    }

    #[test]
    fn test_tunable_multiplier() {
        let e = ScoreEngine::new(
            ScoreConfig {
                base_points: 10.0,
                chain_multiplier: 2.0,
            },
            Box::new(MemoryHighScores::default()),
        );
        assert_eq!(e.calculate(4), 10 * 4 * 8);
    }

    #[test]
    fn test_huge_chain_saturates() {
        let e = engine();
        assert_eq!(e.calculate(10_000), u64::MAX);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0), "0");
        assert_eq!(format_score(999), "999");
        assert_eq!(format_score(1000), "1K");
        assert_eq!(format_score(1500), "1.5K");
        assert_eq!(format_score(2531), "2.5K");
        assert_eq!(format_score(12_000_000), "12M");
        assert_eq!(format_score(2_100_000_000), "2.1B");
    }
}

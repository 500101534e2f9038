//! Game: one play session's grid, scoring, power meter and state machine,
//! driven by tile selections and a frame clock.
//!
//! All mutation goes through `&mut Game`, so a chain (score, meter, clear,
//! refill schedule) is always processed as one step before the next selection.

use crate::chain::{ChainFinder, ChainOutcome};
use crate::config::GameConfig;
use crate::event::{EventBus, GameEvent, SubscriberId};
use crate::grid::{Grid, Pos, TileColor};
use crate::powerup::{PowerUpEngine, PowerUpKind};
use crate::score::{HighScoreStore, ScoreEngine};
use crate::session::{
    GateToken, SessionMachine, SessionState, Transition, TransitionError, TransitionHandle,
    TransitionKind, TransitionOutcome,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, info};

/// Cleared tiles waiting to be refilled.
#[derive(Debug, Clone)]
struct ScheduledRefill {
    due: Duration,
    cells: Vec<Pos>,
}

/// What a tile selection did.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// Not playing (or no board yet).
    Ignored,
    /// Chain below the minimum size.
    NoChain { size: usize },
    Chain {
        size: usize,
        points: u64,
        power_up: Option<PowerUpKind>,
    },
}

#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    rng: StdRng,
    grid: Option<Grid>,
    finder: ChainFinder,
    score: ScoreEngine,
    power: PowerUpEngine,
    session: SessionMachine,
    bus: EventBus,
    /// Frame clock: sum of every tick's delta.
    clock: Duration,
    refills: Vec<ScheduledRefill>,
    multiplier_remaining: Duration,
}

impl Game {
    pub fn new(config: GameConfig, store: Box<dyn HighScoreStore>) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            finder: ChainFinder::new(config.grid.min_chain),
            score: ScoreEngine::new(config.score, store),
            power: PowerUpEngine::new(config.power_up),
            session: SessionMachine::new(config.session.time_limit),
            config,
            rng,
            grid: None,
            bus: EventBus::new(),
            clock: Duration::ZERO,
            refills: Vec::new(),
            multiplier_remaining: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// `None` until the first game starts.
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn score(&self) -> &ScoreEngine {
        &self.score
    }

    pub fn score_mut(&mut self) -> &mut ScoreEngine {
        &mut self.score
    }

    pub fn power(&self) -> &PowerUpEngine {
        &self.power
    }

    /// Chain-size factor right now: the configured amount inside the window, else 1.
    pub fn multiplier(&self) -> f32 {
        if self.multiplier_remaining.is_zero() {
            1.0
        } else {
            self.power.config().multiplier_amount
        }
    }

    pub fn multiplier_remaining(&self) -> Duration {
        self.multiplier_remaining
    }

    #[cfg(test)]
    pub fn pending_refills(&self) -> usize {
        self.refills.len()
    }

    // ── Subscriptions ──

    pub fn subscribe(&mut self) -> SubscriberId {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn drain_events(&mut self, id: SubscriberId) -> Vec<GameEvent> {
        self.bus.drain(id)
    }

    // ── Session control ──

    pub fn start_game(&mut self) -> TransitionOutcome {
        self.transition(SessionMachine::start_game)
    }

    pub fn pause_game(&mut self) -> TransitionOutcome {
        self.transition(SessionMachine::pause_game)
    }

    pub fn resume_game(&mut self) -> TransitionOutcome {
        self.transition(SessionMachine::resume_game)
    }

    #[cfg(test)]
    pub fn end_game(&mut self) -> TransitionOutcome {
        self.transition(SessionMachine::end_game)
    }

    pub fn to_main_menu(&mut self) -> TransitionOutcome {
        self.transition(SessionMachine::to_main_menu)
    }

    /// Hold the exit-animation gate; see [`SessionMachine::claim_gate`].
    pub fn claim_transition_gate(&mut self) -> Result<GateToken, TransitionError> {
        self.session.claim_gate()
    }

    pub fn release_transition_gate(&mut self, token: GateToken) -> Result<(), TransitionError> {
        let mut events = Vec::new();
        if let Some(t) = self.session.release_gate(token, &mut events)? {
            self.on_transition(t, &mut events);
        }
        self.bus.publish_all(events);
        Ok(())
    }

    /// Called by the gate holder once its exit animation is done.
    pub fn complete_transition(
        &mut self,
        handle: TransitionHandle,
    ) -> Result<Transition, TransitionError> {
        let mut events = Vec::new();
        let result = self.session.complete_transition(handle, &mut events);
        if let Ok(t) = result {
            self.on_transition(t, &mut events);
        }
        self.bus.publish_all(events);
        result
    }

    fn transition(
        &mut self,
        op: fn(&mut SessionMachine, &mut Vec<GameEvent>) -> TransitionOutcome,
    ) -> TransitionOutcome {
        let mut events = Vec::new();
        let outcome = op(&mut self.session, &mut events);
        self.apply_outcome(outcome, &mut events);
        self.bus.publish_all(events);
        outcome
    }

    fn apply_outcome(&mut self, outcome: TransitionOutcome, events: &mut Vec<GameEvent>) {
        if let TransitionOutcome::Completed(t) = outcome {
            self.on_transition(t, events);
        }
    }

    fn on_transition(&mut self, transition: Transition, events: &mut Vec<GameEvent>) {
        info!(kind = ?transition.kind, from = ?transition.from, to = ?transition.to, "transition");
        if transition.kind == TransitionKind::Start {
            self.on_game_started(events);
        }
        self.on_state_changed(transition.to);
    }

    fn on_game_started(&mut self, events: &mut Vec<GameEvent>) {
        self.score.reset_current_score(events);
        self.power.reset();
        self.refills.clear();
        self.multiplier_remaining = Duration::ZERO;
        events.push(GameEvent::PowerMeterChanged(self.power.meter()));

        match self.grid.as_mut() {
            Some(grid) => grid.reset(&mut self.rng),
            None => {
                self.grid = Some(Grid::new(
                    self.config.grid.width,
                    self.config.grid.height,
                    &mut self.rng,
                ));
            }
        }
        if let Some(grid) = self.grid.as_ref() {
            events.push(GameEvent::TilesActivated(all_cells(grid)));
        }
    }

    fn on_state_changed(&mut self, state: SessionState) {
        if let Some(grid) = self.grid.as_mut() {
            grid.set_all_active(state == SessionState::Playing);
        }
    }

    // ── Gameplay ──

    /// Player picked the tile at `pos`.
    pub fn on_tile_selected(&mut self, pos: Pos) -> SelectOutcome {
        if !self.session.is_playing() {
            return SelectOutcome::Ignored;
        }
        let factor = self.multiplier();
        let Some(grid) = self.grid.as_mut() else {
            return SelectOutcome::Ignored;
        };

        let mut events = Vec::new();
        let chain = match self.finder.evaluate(grid, pos) {
            ChainOutcome::TooShort(chain) => {
                let size = chain.len();
                debug!(?pos, size, "chain too short");
                events.push(GameEvent::NoChain(chain.cells));
                self.bus.publish_all(events);
                return SelectOutcome::NoChain { size };
            }
            ChainOutcome::Valid(chain) => chain,
        };

        let size = chain.len();
        let scaled = (f64::from(factor) * size as f64).round_ties_even() as usize;
        let points = self
            .score
            .add_chain_score(scaled, &mut events)
            .unwrap_or_default();
        let activation = self.power.add_progress(size, &mut self.rng, &mut events);

        let cleared = grid.deactivate(&chain.cells);
        events.push(GameEvent::TilesDeactivated(cleared));
        self.refills.push(ScheduledRefill {
            due: self.clock + self.config.session.regeneration_delay,
            cells: chain.cells,
        });
        info!(
            ?pos,
            color = chain.color.map(TileColor::name),
            size,
            factor,
            points,
            "chain cleared"
        );

        let power_up = activation.map(|a| {
            let kind = self.power.consume(a);
            events.push(GameEvent::PowerMeterChanged(self.power.meter()));
            self.apply_power_up(kind, &mut events);
            kind
        });

        self.bus.publish_all(events);
        SelectOutcome::Chain {
            size,
            points,
            power_up,
        }
    }

    fn apply_power_up(&mut self, kind: PowerUpKind, events: &mut Vec<GameEvent>) {
        info!(?kind, "applying power-up");
        match kind {
            PowerUpKind::ColorConverter => self.convert_most_common_color(events),
            PowerUpKind::TimeBonus => {
                self.session
                    .add_bonus_time(self.config.power_up.time_bonus, events);
            }
            PowerUpKind::ScoreMultiplier => {
                self.multiplier_remaining += self.config.power_up.multiplier_duration;
                events.push(GameEvent::MultiplierChanged {
                    factor: self.multiplier(),
                    remaining: self.multiplier_remaining,
                });
            }
        }
    }

    /// Every tile of the most common active colour takes the second most common colour.
    fn convert_most_common_color(&mut self, events: &mut Vec<GameEvent>) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        let mut ranked: Vec<(TileColor, Vec<Pos>)> = grid
            .cells_by_color()
            .into_iter()
            .map(|(color, cells)| (color, cells.into_iter().collect()))
            .collect();
        if ranked.len() < 2 {
            debug!("color converter needs two colours on the board");
            return;
        }
        // Stable sort: equal counts keep colour order.
        ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        let target = ranked[1].0;
        let (from, cells) = ranked.swap_remove(0);
        let cells = grid.recolor(&cells, target);
        debug!(from = from.name(), to = target.name(), count = cells.len(), "colours converted");
        events.push(GameEvent::TilesRecolored {
            cells,
            color: target,
        });
    }

    /// Advance the frame clock: multiplier window, refills, session timer.
    pub fn tick(&mut self, dt: Duration) {
        let mut events = Vec::new();
        self.clock += dt;

        if !self.multiplier_remaining.is_zero() {
            self.multiplier_remaining = self.multiplier_remaining.saturating_sub(dt);
            if self.multiplier_remaining.is_zero() {
                events.push(GameEvent::MultiplierChanged {
                    factor: 1.0,
                    remaining: Duration::ZERO,
                });
            }
        }

        self.fire_due_refills(&mut events);

        let outcome = self.session.tick(dt, &mut events);
        self.apply_outcome(outcome, &mut events);
        self.bus.publish_all(events);
    }

    fn fire_due_refills(&mut self, events: &mut Vec<GameEvent>) {
        let now = self.clock;
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.refills)
            .into_iter()
            .partition(|r| r.due <= now);
        self.refills = later;

        for refill in due {
            match self.grid.as_mut() {
                Some(grid) if self.session.is_playing() => {
                    let fresh = grid.regenerate(&refill.cells, &mut self.rng);
                    debug!(count = fresh.len(), "tiles refilled");
                    events.push(GameEvent::TilesActivated(fresh));
                }
                _ => debug!(count = refill.cells.len(), "refill skipped; session not active"),
            }
        }
    }
}

fn all_cells(grid: &Grid) -> Vec<(Pos, TileColor)> {
    (0..grid.height())
        .flat_map(|y| (0..grid.width()).map(move |x| Pos::new(x, y)))
        .filter_map(|p| grid.get(p.x, p.y).map(|c| (p, c.color)))
        .collect()
}

#[cfg(test)]
impl Game {
    /// Swap in a hand-built board (after `start_game`).
    fn replace_grid(&mut self, grid: Grid) {
        self.grid = Some(grid);
    }
}

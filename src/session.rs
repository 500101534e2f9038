//! Session state machine: menu / playing / paused / game over, countdown timer,
//! and the two-phase (request → complete) transition protocol.

use crate::event::GameEvent;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default session length.
pub const TIME_LIMIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    MainMenu,
    Playing,
    Paused,
    GameOver,
}

/// Which operation asked for a transition; decides what happens on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Start,
    Pause,
    Resume,
    End,
    ToMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub from: SessionState,
    pub to: SessionState,
}

/// Ticket for a gated transition; redeem with [`SessionMachine::complete_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionHandle(u64);

/// Proof of holding the transition gate. Only one exists at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct GateToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State already changed.
    Completed(Transition),
    /// Waiting for the gate holder to complete it.
    Pending(TransitionHandle),
    /// Guard failed or another transition is pending; nothing changed.
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no transition is pending")]
    NonePending,
    #[error("transition handle {0:?} does not match the pending transition")]
    StaleHandle(TransitionHandle),
    #[error("the transition gate is already held")]
    GateHeld,
    #[error("gate token does not match the current holder")]
    WrongGate,
}

#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    timer: Duration,
    time_limit: Duration,
    active: bool,
    gate: Option<u64>,
    pending: Option<(TransitionHandle, Transition)>,
    next_id: u64,
}

impl SessionMachine {
    pub fn new(time_limit: Duration) -> Self {
        Self {
            state: SessionState::MainMenu,
            timer: time_limit,
            time_limit,
            active: false,
            gate: None,
            pending: None,
            next_id: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timer(&self) -> Duration {
        self.timer
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Playing and accepting input.
    pub fn is_playing(&self) -> bool {
        self.is_active() && self.state == SessionState::Playing
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<Transition> {
        self.pending.map(|(_, t)| t)
    }

    /// Become the single listener that completes transitions. While held,
    /// every transition is announced with `StateChangeRequested` and waits.
    pub fn claim_gate(&mut self) -> Result<GateToken, TransitionError> {
        if self.gate.is_some() {
            return Err(TransitionError::GateHeld);
        }
        let id = self.bump_id();
        self.gate = Some(id);
        Ok(GateToken(id))
    }

    /// Give up the gate. A transition still pending completes immediately.
    pub fn release_gate(
        &mut self,
        token: GateToken,
        events: &mut Vec<GameEvent>,
    ) -> Result<Option<Transition>, TransitionError> {
        if self.gate != Some(token.0) {
            return Err(TransitionError::WrongGate);
        }
        self.gate = None;
        Ok(self.pending.take().map(|(_, t)| self.finish(t, events)))
    }

    pub fn start_game(&mut self, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        self.request(TransitionKind::Start, SessionState::Playing, events)
    }

    pub fn pause_game(&mut self, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        if self.state != SessionState::Playing {
            return TransitionOutcome::Ignored;
        }
        self.request(TransitionKind::Pause, SessionState::Paused, events)
    }

    pub fn resume_game(&mut self, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        if self.state != SessionState::Paused {
            return TransitionOutcome::Ignored;
        }
        self.request(TransitionKind::Resume, SessionState::Playing, events)
    }

    pub fn end_game(&mut self, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        self.request(TransitionKind::End, SessionState::GameOver, events)
    }

    pub fn to_main_menu(&mut self, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        self.request(TransitionKind::ToMenu, SessionState::MainMenu, events)
    }

    /// Finish the pending transition named by `handle`.
    pub fn complete_transition(
        &mut self,
        handle: TransitionHandle,
        events: &mut Vec<GameEvent>,
    ) -> Result<Transition, TransitionError> {
        match self.pending {
            None => Err(TransitionError::NonePending),
            Some((h, _)) if h != handle => Err(TransitionError::StaleHandle(handle)),
            Some((_, t)) => {
                self.pending = None;
                Ok(self.finish(t, events))
            }
        }
    }

    /// Extra time, no upper bound. State is unchanged.
    pub fn add_bonus_time(&mut self, amount: Duration, events: &mut Vec<GameEvent>) {
        self.timer = self.timer.saturating_add(amount);
        events.push(GameEvent::TimerChanged(self.timer));
    }

    /// Count down while playing; at zero, request the end of the game.
    pub fn tick(&mut self, dt: Duration, events: &mut Vec<GameEvent>) -> TransitionOutcome {
        if !self.is_playing() {
            return TransitionOutcome::Ignored;
        }
        self.timer = self.timer.saturating_sub(dt);
        events.push(GameEvent::TimerChanged(self.timer));
        if self.timer.is_zero() {
            return self.end_game(events);
        }
        TransitionOutcome::Ignored
    }

    fn request(
        &mut self,
        kind: TransitionKind,
        to: SessionState,
        events: &mut Vec<GameEvent>,
    ) -> TransitionOutcome {
        if let Some((_, pending)) = self.pending {
            debug!(?kind, ?pending, "transition already pending; request ignored");
            return TransitionOutcome::Ignored;
        }
        let transition = Transition {
            kind,
            from: self.state,
            to,
        };
        if self.gate.is_none() {
            return TransitionOutcome::Completed(self.finish(transition, events));
        }
        let handle = TransitionHandle(self.bump_id());
        self.pending = Some((handle, transition));
        events.push(GameEvent::StateChangeRequested {
            from: transition.from,
            to,
            handle,
        });
        TransitionOutcome::Pending(handle)
    }

    fn finish(&mut self, transition: Transition, events: &mut Vec<GameEvent>) -> Transition {
        self.state = transition.to;
        match transition.kind {
            TransitionKind::Start => {
                self.timer = self.time_limit;
                self.active = true;
                events.push(GameEvent::GameStarted);
                events.push(GameEvent::TimerChanged(self.timer));
            }
            TransitionKind::Pause => self.active = false,
            TransitionKind::Resume => self.active = true,
            TransitionKind::End => {
                self.active = false;
                events.push(GameEvent::GameEnded);
            }
            TransitionKind::ToMenu => {
                self.active = false;
                self.timer = self.time_limit;
                events.push(GameEvent::TimerChanged(self.timer));
            }
        }
        events.push(GameEvent::StateChanged(transition.to));
        debug!(from = ?transition.from, to = ?transition.to, "state changed");
        transition
    }

    fn bump_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(TIME_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> SessionMachine {
        let mut s = SessionMachine::default();
        s.start_game(&mut Vec::new());
        s
    }

    #[test]
    fn test_initial_state() {
        let s = SessionMachine::default();
        assert_eq!(s.state(), SessionState::MainMenu);
        assert_eq!(s.timer(), TIME_LIMIT);
        assert!(!s.is_active());
    }

    #[test]
    fn test_start_from_menu() {
        let mut s = SessionMachine::default();
        let mut events = Vec::new();
        let outcome = s.start_game(&mut events);
        assert!(matches!(
            outcome,
            TransitionOutcome::Completed(Transition {
                kind: TransitionKind::Start,
                from: SessionState::MainMenu,
                to: SessionState::Playing
            })
        ));
        assert!(s.is_playing());
        assert!(events.contains(&GameEvent::GameStarted));
        assert_eq!(events.last(), Some(&GameEvent::StateChanged(SessionState::Playing)));
    }

    #[test]
    fn test_resume_in_menu_is_noop() {
        let mut s = SessionMachine::default();
        let mut events = Vec::new();
        assert_eq!(s.resume_game(&mut events), TransitionOutcome::Ignored);
        assert_eq!(s.state(), SessionState::MainMenu);
        assert!(events.is_empty());
    }

    #[test]
    fn test_pause_while_paused_is_noop() {
        let mut s = playing();
        let mut events = Vec::new();
        s.pause_game(&mut events);
        assert_eq!(s.state(), SessionState::Paused);
        assert!(!s.is_active());
        assert_eq!(s.pause_game(&mut events), TransitionOutcome::Ignored);
        assert_eq!(s.state(), SessionState::Paused);
        s.resume_game(&mut events);
        assert!(s.is_playing());
    }

    #[test]
    fn test_tick_only_while_playing() {
        let mut s = SessionMachine::default();
        let mut events = Vec::new();
        s.tick(Duration::from_secs(5), &mut events);
        assert_eq!(s.timer(), TIME_LIMIT);
        let mut s = playing();
        s.pause_game(&mut events);
        s.tick(Duration::from_secs(5), &mut events);
        assert_eq!(s.timer(), TIME_LIMIT);
    }

    #[test]
    fn test_timer_drains_to_exactly_zero_and_ends_once() {
        let mut s = playing();
        let mut events = Vec::new();
        let dt = Duration::from_secs_f64(1.0 / 60.0);
        for _ in 0..5000 {
            s.tick(dt, &mut events);
        }
        assert_eq!(s.timer(), Duration::ZERO);
        assert_eq!(s.state(), SessionState::GameOver);
        let ended = events.iter().filter(|e| **e == GameEvent::GameEnded).count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_bonus_time_uncapped() {
        let mut s = playing();
        let mut events = Vec::new();
        s.add_bonus_time(Duration::from_secs(10), &mut events);
        assert_eq!(s.timer(), Duration::from_secs(70));
        assert_eq!(s.state(), SessionState::Playing);
        assert_eq!(events, vec![GameEvent::TimerChanged(Duration::from_secs(70))]);
    }

    #[test]
    fn test_end_and_menu_reset_timer() {
        let mut s = playing();
        let mut events = Vec::new();
        s.tick(Duration::from_secs(20), &mut events);
        s.end_game(&mut events);
        assert_eq!(s.state(), SessionState::GameOver);
        assert_eq!(s.timer(), Duration::from_secs(40));
        s.to_main_menu(&mut events);
        assert_eq!(s.state(), SessionState::MainMenu);
        assert_eq!(s.timer(), TIME_LIMIT);
        assert!(!s.is_active());
    }

    #[test]
    fn test_gated_transition_waits_for_completion() {
        let mut s = SessionMachine::default();
        let _gate = s.claim_gate().unwrap();
        let mut events = Vec::new();
        let TransitionOutcome::Pending(handle) = s.start_game(&mut events) else {
            panic!("expected pending transition");
        };
        assert_eq!(s.state(), SessionState::MainMenu);
        assert_eq!(
            events,
            vec![GameEvent::StateChangeRequested {
                from: SessionState::MainMenu,
                to: SessionState::Playing,
                handle
            }]
        );
        let done = s.complete_transition(handle, &mut events).unwrap();
        assert_eq!(done.to, SessionState::Playing);
        assert!(s.is_playing());
    }

    #[test]
    fn test_only_one_pending_transition() {
        let mut s = SessionMachine::default();
        let _gate = s.claim_gate().unwrap();
        let mut events = Vec::new();
        let first = s.start_game(&mut events);
        assert!(matches!(first, TransitionOutcome::Pending(_)));
        assert_eq!(s.to_main_menu(&mut events), TransitionOutcome::Ignored);
        assert_eq!(s.pending().map(|t| t.kind), Some(TransitionKind::Start));
    }

    #[test]
    fn test_stale_and_missing_handles() {
        let mut s = SessionMachine::default();
        let _gate = s.claim_gate().unwrap();
        let mut events = Vec::new();
        let TransitionOutcome::Pending(h1) = s.start_game(&mut events) else {
            panic!("expected pending transition");
        };
        s.complete_transition(h1, &mut events).unwrap();
        assert_eq!(
            s.complete_transition(h1, &mut events),
            Err(TransitionError::NonePending)
        );
        let TransitionOutcome::Pending(h2) = s.pause_game(&mut events) else {
            panic!("expected pending transition");
        };
        assert_eq!(
            s.complete_transition(h1, &mut events),
            Err(TransitionError::StaleHandle(h1))
        );
        assert!(s.complete_transition(h2, &mut events).is_ok());
        assert_eq!(s.state(), SessionState::Paused);
    }

    #[test]
    fn test_timer_end_while_gated_requests_once() {
        let mut s = playing();
        let _gate = s.claim_gate().unwrap();
        let mut events = Vec::new();
        for _ in 0..10 {
            s.tick(Duration::from_secs(30), &mut events);
        }
        let requests = events
            .iter()
            .filter(|e| matches!(e, GameEvent::StateChangeRequested { .. }))
            .count();
        assert_eq!(requests, 1);
        assert_eq!(s.timer(), Duration::ZERO);
    }

    #[test]
    fn test_gate_is_single_consumer() {
        let mut s = SessionMachine::default();
        let gate = s.claim_gate().unwrap();
        assert_eq!(s.claim_gate(), Err(TransitionError::GateHeld));
        let mut events = Vec::new();
        s.start_game(&mut events);
        let finished = s.release_gate(gate, &mut events).unwrap();
        assert_eq!(finished.map(|t| t.to), Some(SessionState::Playing));
        assert!(s.claim_gate().is_ok());
    }
}

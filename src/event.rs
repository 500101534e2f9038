//! Notifications emitted by the core during an operation.
//! The presentation layer consumes these for animation and HUD refresh;
//! the core never waits on them.

use crate::grid::{Pos, TileColor};
use crate::powerup::PowerUpKind;
use crate::session::{SessionState, TransitionHandle};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    TilesActivated(Vec<(Pos, TileColor)>),
    TilesDeactivated(Vec<Pos>),
    TilesRecolored { cells: Vec<Pos>, color: TileColor },
    /// Selection produced a chain below the minimum; cells are the short chain.
    NoChain(Vec<Pos>),
    ChainScored { chain_size: usize, points: u64 },
    ScoreChanged(u64),
    HighScoreBeaten(u64),
    PowerMeterChanged(f32),
    PowerUpActivated(PowerUpKind),
    MultiplierChanged { factor: f32, remaining: Duration },
    TimerChanged(Duration),
    /// A gated transition is waiting for `complete_transition(handle)`.
    StateChangeRequested {
        from: SessionState,
        to: SessionState,
        handle: TransitionHandle,
    },
    StateChanged(SessionState),
    GameStarted,
    GameEnded,
}

/// Identifies one registered listener on an [`EventBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

/// Fan-out queue: each subscriber gets its own copy of every event published
/// after it subscribed, and drains it at its own pace. Subscribers must
/// `unsubscribe` when they go away; events for unknown ids are dropped.
#[derive(Debug, Default)]
pub struct EventBus {
    next_id: u64,
    queues: BTreeMap<SubscriberId, VecDeque<GameEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.queues.insert(id, VecDeque::new());
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.queues.remove(&id).is_some()
    }

    pub fn publish(&mut self, event: GameEvent) {
        for queue in self.queues.values_mut() {
            queue.push_back(event.clone());
        }
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Take everything queued for `id` (oldest first).
    pub fn drain(&mut self, id: SubscriberId) -> Vec<GameEvent> {
        self.queues
            .get_mut(&id)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_subscriber_sees_every_event() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(GameEvent::GameStarted);
        bus.publish(GameEvent::ScoreChanged(675));
        assert_eq!(
            bus.drain(a),
            vec![GameEvent::GameStarted, GameEvent::ScoreChanged(675)]
        );
        assert_eq!(bus.drain(a), vec![]);
        assert_eq!(bus.drain(b).len(), 2);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let mut bus = EventBus::new();
        bus.publish(GameEvent::GameStarted);
        let late = bus.subscribe();
        bus.publish(GameEvent::GameEnded);
        assert_eq!(bus.drain(late), vec![GameEvent::GameEnded]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.publish(GameEvent::GameStarted);
        assert!(bus.drain(a).is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }
}

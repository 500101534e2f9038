//! App: terminal init, frame loop, key/mouse handling, and the bridge from
//! game events to on-screen effects.

use crate::event::{GameEvent, SubscriberId};
use crate::game::{Game, SelectOutcome};
use crate::grid::Pos;
use crate::input::{Action, key_to_action};
use crate::session::{GateToken, SessionState};
use crate::theme::Theme;
use crate::ui::{self, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Frame-loop options from the command line.
#[derive(Debug, Clone, Copy)]
pub struct AppOptions {
    pub frame_rate: f64,
    /// Transitions complete immediately and no fades run.
    pub no_animation: bool,
    /// Skip the main menu and start playing.
    pub no_menu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    game: Game,
    theme: Theme,
    options: AppOptions,
    view: View,
    subscriber: SubscriberId,
    /// Held while animations are on; every state change then waits for the exit fade.
    gate: Option<GateToken>,
}

impl App {
    pub fn new(mut game: Game, theme: Theme, options: AppOptions) -> Result<Self> {
        let subscriber = game.subscribe();
        if options.no_menu {
            game.start_game();
        }
        let gate = if options.no_animation {
            None
        } else {
            Some(game.claim_transition_gate()?)
        };
        let cursor = Pos::new(game.config().grid.width / 2, game.config().grid.height / 2);
        let mut app = Self {
            game,
            theme,
            options,
            view: View::new(cursor),
            subscriber,
            gate,
        };
        app.process_events(Instant::now());
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        info!(options = ?self.options, "terminal ready");

        let result = self.run_loop(&mut terminal);

        if let Some(token) = self.gate.take() {
            if let Err(err) = self.game.release_transition_gate(token) {
                warn!(%err, "releasing transition gate");
            }
        }
        self.game.unsubscribe(self.subscriber);
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        info!(
            score = self.game.score().current_score(),
            best = self.game.score().high_score(),
            "exiting"
        );
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.options.frame_rate.max(1.0));
        let mut last_frame = Instant::now();
        loop {
            let now = Instant::now();
            self.game.tick(now.saturating_duration_since(last_frame));
            last_frame = now;
            self.process_events(now);

            terminal.draw(|f| ui::draw(f, &self.game, &self.theme, &mut self.view, now))?;
            self.finish_effects(now);

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let flow = match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.on_action(key_to_action(key))
                    }
                    Event::Mouse(mouse) => self.on_mouse(mouse),
                    _ => Flow::Continue,
                };
                if flow == Flow::Quit {
                    return Ok(());
                }
                self.process_events(Instant::now());
            }
        }
    }

    fn on_action(&mut self, action: Action) -> Flow {
        if action == Action::Quit {
            return Flow::Quit;
        }
        // Input waits while the screen fades out.
        if self.view.is_exiting() {
            return Flow::Continue;
        }
        match (self.game.state(), action) {
            (_, Action::Restart)
            | (SessionState::MainMenu | SessionState::GameOver, Action::Select) => {
                self.game.start_game();
            }
            (SessionState::Playing | SessionState::Paused | SessionState::GameOver, Action::Menu) => {
                self.game.to_main_menu();
            }
            (SessionState::Playing, Action::Pause) => {
                self.game.pause_game();
            }
            (SessionState::Paused, Action::Pause | Action::Select) => {
                self.game.resume_game();
            }
            (SessionState::Playing, Action::Select) => {
                self.select(self.view.cursor);
            }
            (SessionState::Playing, _) => self.move_cursor(action),
            _ => {}
        }
        Flow::Continue
    }

    fn on_mouse(&mut self, mouse: MouseEvent) -> Flow {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) || self.view.is_exiting() {
            return Flow::Continue;
        }
        match self.game.state() {
            SessionState::Playing => {
                let hit = self
                    .game
                    .grid()
                    .and_then(|g| ui::tile_at(self.view.board, g, mouse.column, mouse.row));
                if let Some(pos) = hit {
                    self.view.cursor = pos;
                    self.select(pos);
                }
            }
            SessionState::MainMenu | SessionState::GameOver => {
                self.game.start_game();
            }
            SessionState::Paused => {
                self.game.resume_game();
            }
        }
        Flow::Continue
    }

    fn select(&mut self, pos: Pos) {
        if let SelectOutcome::Chain {
            power_up: Some(kind),
            ..
        } = self.game.on_tile_selected(pos)
        {
            info!(?kind, "power-up applied");
        }
    }

    fn move_cursor(&mut self, action: Action) {
        let Some(grid) = self.game.grid() else {
            return;
        };
        let Pos { x, y } = self.view.cursor;
        // Row 0 is at the bottom of the screen.
        self.view.cursor = match action {
            Action::CursorUp => Pos::new(x, (y + 1).min(grid.height() - 1)),
            Action::CursorDown => Pos::new(x, y.saturating_sub(1)),
            Action::CursorLeft => Pos::new(x.saturating_sub(1), y),
            Action::CursorRight => Pos::new((x + 1).min(grid.width() - 1), y),
            _ => return,
        };
    }

    /// Turn queued game events into view feedback.
    fn process_events(&mut self, now: Instant) {
        for event in self.game.drain_events(self.subscriber) {
            match event {
                GameEvent::TilesDeactivated(cells) if !self.options.no_animation => {
                    self.view.start_clear(cells);
                }
                GameEvent::NoChain(cells) => self.view.flash_rejected(cells, now),
                GameEvent::ChainScored { chain_size, points } => {
                    self.view.last_chain = Some((chain_size, points));
                }
                GameEvent::PowerUpActivated(kind) => self.view.last_power_up = Some(kind),
                GameEvent::HighScoreBeaten(_) => self.view.new_record = true,
                GameEvent::GameStarted => self.view.reset(),
                GameEvent::StateChangeRequested { handle, .. } => self.view.start_exit(handle),
                _ => {}
            }
        }
    }

    /// After a frame: retire finished fades and complete a transition whose fade is done.
    fn finish_effects(&mut self, now: Instant) {
        self.view.finish_effects();
        if let Some(handle) = self.view.take_finished_exit() {
            if let Err(err) = self.game.complete_transition(handle) {
                warn!(%err, "completing transition");
            }
            self.process_events(now);
        }
    }
}

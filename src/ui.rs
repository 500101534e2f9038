//! Layout and drawing: menu, board, sidebar HUD, pause and game-over overlays,
//! plus the TachyonFX fades for cleared tiles and screen transitions.

use crate::game::Game;
use crate::grid::{Grid, Pos};
use crate::powerup::{MAX_POWER, PowerUpKind};
use crate::score::format_score;
use crate::session::{SessionState, TransitionHandle};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal cells per tile.
const TILE_W: u16 = 4;
const TILE_H: u16 = 2;
const SIDEBAR_WIDTH: u16 = 26;

/// Fade of cleared tiles to the board background.
const CLEAR_FADE_MS: u32 = 300;
/// Whole-screen fade before a state change completes.
const EXIT_FADE_MS: u32 = 250;
/// How long a too-short chain stays highlighted.
const REJECT_FLASH: Duration = Duration::from_millis(250);

/// Presentation state the app loop keeps between frames.
pub struct View {
    pub cursor: Pos,
    /// Inner board rect from the last draw; used for mouse hit-testing.
    pub board: Rect,
    clearing: Vec<Pos>,
    clear_fx: Option<Effect>,
    exit: Option<TransitionHandle>,
    exit_fx: Option<Effect>,
    rejected: Vec<Pos>,
    rejected_until: Option<Instant>,
    last_fx_time: Option<Instant>,
    pub last_chain: Option<(usize, u64)>,
    pub last_power_up: Option<PowerUpKind>,
    pub new_record: bool,
}

impl View {
    pub fn new(cursor: Pos) -> Self {
        Self {
            cursor,
            board: Rect::default(),
            clearing: Vec::new(),
            clear_fx: None,
            exit: None,
            exit_fx: None,
            rejected: Vec::new(),
            rejected_until: None,
            last_fx_time: None,
            last_chain: None,
            last_power_up: None,
            new_record: false,
        }
    }

    /// Forget per-game feedback (new game started).
    pub fn reset(&mut self) {
        self.clearing.clear();
        self.clear_fx = None;
        self.rejected.clear();
        self.rejected_until = None;
        self.last_chain = None;
        self.last_power_up = None;
        self.new_record = false;
    }

    pub fn start_clear(&mut self, cells: Vec<Pos>) {
        self.clearing = cells;
        self.clear_fx = None;
    }

    pub fn flash_rejected(&mut self, cells: Vec<Pos>, now: Instant) {
        self.rejected = cells;
        self.rejected_until = Some(now + REJECT_FLASH);
    }

    fn is_rejected(&self, pos: Pos, now: Instant) -> bool {
        self.rejected_until.is_some_and(|t| now < t) && self.rejected.contains(&pos)
    }

    /// Begin the exit fade for a gated transition.
    pub fn start_exit(&mut self, handle: TransitionHandle) {
        self.exit = Some(handle);
        self.exit_fx = None;
    }

    pub fn is_exiting(&self) -> bool {
        self.exit.is_some()
    }

    /// Handle of the transition whose exit fade has finished, if any. Clears it.
    pub fn take_finished_exit(&mut self) -> Option<TransitionHandle> {
        if self.exit_fx.as_ref().is_some_and(Effect::done) {
            self.exit_fx = None;
            return self.exit.take();
        }
        None
    }

    /// Drop effects that have run to completion.
    pub fn finish_effects(&mut self) {
        if self.clear_fx.as_ref().is_some_and(Effect::done) {
            self.clear_fx = None;
            self.clearing.clear();
        }
    }

    fn fx_delta(&mut self, now: Instant) -> TfxDuration {
        let delta = self
            .last_fx_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO);
        self.last_fx_time = Some(now);
        TfxDuration::from_millis(delta.as_millis().min(u128::from(u32::MAX)) as u32)
    }
}

/// Outer board size (with border) in terminal cells.
fn board_size(grid: &Grid) -> (u16, u16) {
    (
        grid.width() as u16 * TILE_W + 2,
        grid.height() as u16 * TILE_H + 2,
    )
}

/// Centered board + sidebar.
fn game_layout(area: Rect, grid: &Grid) -> (Rect, Rect) {
    let (bw, bh) = board_size(grid);
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bw + SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh.max(20)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let board = Rect {
        height: bh.min(inner[0].height),
        ..inner[0]
    };
    (board, inner[1])
}

/// Terminal rect of one tile; row y = 0 is drawn at the bottom.
fn tile_rect(board: Rect, grid: &Grid, pos: Pos) -> Rect {
    let row_from_top = grid.height().saturating_sub(pos.y + 1) as u16;
    Rect {
        x: board.x + pos.x as u16 * TILE_W,
        y: board.y + row_from_top * TILE_H,
        width: TILE_W,
        height: TILE_H,
    }
    .intersection(board)
}

/// Tile under a terminal cell (mouse click), if any.
pub fn tile_at(board: Rect, grid: &Grid, column: u16, row: u16) -> Option<Pos> {
    if !board.contains(Position::new(column, row)) {
        return None;
    }
    let x = usize::from((column - board.x) / TILE_W);
    let row_from_top = usize::from((row - board.y) / TILE_H);
    let y = grid.height().checked_sub(row_from_top + 1)?;
    grid.in_bounds(x, y).then_some(Pos::new(x, y))
}

/// `mm:ss`, rounding partial seconds up so the clock reads 00:00 only at zero.
pub fn format_clock(d: Duration) -> String {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn border_style(theme: &Theme) -> Style {
    Style::default().fg(theme.div_line).bg(theme.bg)
}

/// Draw the screen for the current session state and run active effects.
pub fn draw(frame: &mut Frame, game: &Game, theme: &Theme, view: &mut View, now: Instant) {
    let area = frame.area();
    let delta = view.fx_delta(now);

    match (game.state(), game.grid()) {
        (SessionState::MainMenu, _) | (_, None) => draw_menu(frame, game, theme, area),
        (state, Some(grid)) => {
            let (board_outer, sidebar) = game_layout(area, grid);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border_style(theme))
                .title(Span::styled(" Color Chain ", theme.title));
            view.board = block.inner(board_outer);
            block.render(board_outer, frame.buffer_mut());
            draw_board(frame, game, grid, theme, view, now);
            draw_sidebar(frame, game, theme, view, sidebar);
            apply_clear_effect(frame, grid, theme, view, delta);
            match state {
                SessionState::Paused => draw_pause_overlay(frame, theme, board_outer),
                SessionState::GameOver => draw_game_over(frame, game, theme, view, board_outer),
                _ => {}
            }
        }
    }

    apply_exit_effect(frame, theme, view, area, delta);
}

fn draw_menu(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) {
    let popup = centered(area, 44, 16);
    let swatch: Vec<Span> = theme
        .tiles
        .iter()
        .flat_map(|&c| [Span::styled("    ", Style::default().bg(c)), Span::from(" ")])
        .collect();
    let key = Style::default().fg(theme.tile_color(crate::grid::TileColor::Blue));
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" COLOR CHAIN ", Style::default().fg(theme.title).bold())),
        Line::from(""),
        Line::from(swatch),
        Line::from(""),
        Line::from(Span::styled(
            "Clear groups of touching same-colour tiles",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!("before the {}s clock runs out.", game.session().time_limit().as_secs()),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Best: ", Style::default().fg(theme.title)),
            Span::styled(
                format_score(game.score().high_score()),
                Style::default().fg(theme.main_fg),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ENTER ", key),
            Span::from("START   "),
            Span::styled(" Q ", key),
            Span::from("QUIT"),
        ]),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style(theme)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_board(frame: &mut Frame, game: &Game, grid: &Grid, theme: &Theme, view: &View, now: Instant) {
    let playing = game.state() == SessionState::Playing;
    let board = view.board;
    let buf = frame.buffer_mut();

    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let pos = Pos::new(x, y);
            let Some(cell) = grid.get(x, y) else {
                continue;
            };
            let color = theme.tile_color(cell.color);
            let (symbol, style) = if view.clearing.contains(&pos) {
                (" ", Style::default().bg(color))
            } else if !playing {
                ("▒", Style::default().fg(color).bg(theme.bg))
            } else if !cell.active {
                (" ", Style::default().bg(theme.bg))
            } else if view.is_rejected(pos, now) {
                ("░", Style::default().fg(theme.inactive_fg).bg(color))
            } else {
                (" ", Style::default().bg(color))
            };
            let rect = tile_rect(board, grid, pos);
            for ry in rect.top()..rect.bottom() {
                for rx in rect.left()..rect.right() {
                    buf[(rx, ry)].set_symbol(symbol).set_style(style);
                }
            }
        }
    }

    if playing {
        let rect = tile_rect(board, grid, view.cursor);
        if rect.width >= 2 {
            let style = Style::default().fg(theme.selected).bold();
            for ry in rect.top()..rect.bottom() {
                buf[(rect.left(), ry)].set_symbol("▐").set_style(style);
                buf[(rect.right() - 1, ry)].set_symbol("▌").set_style(style);
            }
        }
    }
}

fn draw_sidebar(frame: &mut Frame, game: &Game, theme: &Theme, view: &View, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // score, best, last chain
            Constraint::Length(4), // time
            Constraint::Length(4), // power
            Constraint::Length(4), // bonus
            Constraint::Fill(1),   // keys
        ])
        .split(area);

    // --- Score ---
    let inner = section(frame, theme, chunks[0]);
    let last = view
        .last_chain
        .map_or_else(|| "-".to_string(), |(size, points)| format!("{size} → +{}", format_score(points)));
    Paragraph::new(Text::from(vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(format_score(game.score().current_score()), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(format_score(game.score().high_score()), fg_style),
        ]),
        Line::from(vec![Span::styled("Last:  ", title_style), Span::styled(last, fg_style)]),
    ]))
    .render(inner, frame.buffer_mut());

    // --- Time ---
    let session = game.session();
    let inner = section(frame, theme, chunks[1]);
    let rows = two_rows(inner);
    Paragraph::new(Line::from(Span::styled("Time", title_style))).render(rows[0], frame.buffer_mut());
    let limit = session.time_limit().as_secs_f64();
    let ratio = if limit > 0.0 {
        (session.timer().as_secs_f64() / limit).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bar = if ratio > 0.5 {
        Color::Green
    } else if ratio > 0.2 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio)
        .label(format_clock(session.timer()))
        .gauge_style(Style::default().fg(bar).bg(theme.bg))
        .render(rows[1], frame.buffer_mut());

    // --- Power ---
    let power = game.power();
    let inner = section(frame, theme, chunks[2]);
    let rows = two_rows(inner);
    Paragraph::new(Line::from(Span::styled("Power", title_style))).render(rows[0], frame.buffer_mut());
    Gauge::default()
        .ratio(f64::from(power.meter() / MAX_POWER).clamp(0.0, 1.0))
        .label(format!("{:.0}%", power.meter()))
        .gauge_style(Style::default().fg(theme.tile_color(crate::grid::TileColor::Purple)).bg(theme.bg))
        .render(rows[1], frame.buffer_mut());

    // --- Bonus ---
    let inner = section(frame, theme, chunks[3]);
    let remaining = game.multiplier_remaining();
    let multiplier = if remaining.is_zero() {
        Span::styled("x1", fg_style)
    } else {
        Span::styled(
            format!("x{} {:.1}s", game.multiplier(), remaining.as_secs_f64()),
            Style::default().fg(theme.title).bold(),
        )
    };
    let last_power = view.last_power_up.map_or("-", PowerUpKind::label);
    Paragraph::new(Text::from(vec![
        Line::from(vec![Span::styled("Mult:  ", title_style), multiplier]),
        Line::from(vec![Span::styled("Power: ", title_style), Span::styled(last_power, fg_style)]),
    ]))
    .render(inner, frame.buffer_mut());

    // --- Keys ---
    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(" ←↓↑→/hjkl move", fg_style)),
        Line::from(Span::styled(" Enter/Space select", fg_style)),
        Line::from(Span::styled(" P pause  R restart", fg_style)),
        Line::from(Span::styled(" M menu   Q quit", fg_style)),
    ]))
    .render(chunks[4], frame.buffer_mut());
}

/// Bordered sidebar box; returns its inner rect.
fn section(frame: &mut Frame, theme: &Theme, outer: Rect) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(theme));
    let inner = block.inner(outer);
    block.render(outer, frame.buffer_mut());
    inner
}

fn two_rows(area: Rect) -> [Rect; 2] {
    Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area)
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 24, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Paused ", Style::default().fg(Color::Black).bg(Color::Yellow))),
        Line::from(Span::styled("P resume  M menu", Style::default().fg(theme.main_fg))),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style(theme)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, game: &Game, theme: &Theme, view: &View, area: Rect) {
    let popup = centered(area, 26, 11);
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Time's up! ", Style::default().fg(Color::White).bg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled(
            format!("Score: {}", format_score(game.score().current_score())),
            fg,
        )),
        Line::from(Span::styled(
            format!("Best: {}", format_score(game.score().high_score())),
            fg,
        )),
        Line::from(Span::styled(format!("Chains: {}", game.score().chain_count()), fg)),
    ];
    if view.new_record {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("R again  M menu  Q quit", fg)));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style(theme)),
        )
        .render(popup, frame.buffer_mut());
}

/// Fade the tiles of the last chain to the board background.
fn apply_clear_effect(frame: &mut Frame, grid: &Grid, theme: &Theme, view: &mut View, delta: TfxDuration) {
    if view.clearing.is_empty() {
        return;
    }
    let board = view.board;
    if view.clear_fx.is_none() {
        let cells: HashSet<(u16, u16)> = view
            .clearing
            .iter()
            .flat_map(|&pos| {
                let r = tile_rect(board, grid, pos);
                (r.top()..r.bottom()).flat_map(move |y| (r.left()..r.right()).map(move |x| (x, y)))
            })
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cells.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_to(theme.bg, theme.bg, (CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        view.clear_fx = Some(effect);
    }
    if let Some(effect) = view.clear_fx.as_mut() {
        frame.render_effect(effect, board, delta);
    }
}

/// Fade the whole screen out while a state change waits on it.
fn apply_exit_effect(frame: &mut Frame, theme: &Theme, view: &mut View, area: Rect, delta: TfxDuration) {
    if view.exit.is_none() {
        return;
    }
    let effect = view.exit_fx.get_or_insert_with(|| {
        fx::fade_to(theme.bg, theme.bg, (EXIT_FADE_MS, Interpolation::QuadIn)).with_area(area)
    });
    frame.render_effect(effect, area, delta);
}

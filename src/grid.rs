//! Tile grid: fixed W×H board of coloured cells, neighbour lookup, colour grouping.

use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// Default board width in tiles.
pub const DEFAULT_WIDTH: usize = 6;
/// Default board height in tiles.
pub const DEFAULT_HEIGHT: usize = 8;

/// Tile colours. Order doubles as the tie-break order wherever colours are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
}

impl TileColor {
    pub const ALL: [Self; 5] = [Self::Red, Self::Blue, Self::Green, Self::Yellow, Self::Purple];

    /// Uniformly random colour.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Index 0..5 for theme.tile_color().
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
        }
    }
}

/// Grid coordinate. `y = 0` is the bottom row; `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Single tile. The colour is kept while inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub color: TileColor,
    pub active: bool,
}

/// Neighbour offsets in lookup order: up, down, left, right.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (0, -1), (-1, 0), (1, 0)];

/// Board of `width × height` cells. rows[y][x] = cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Allocate a fresh board with uniformly random colours. All cells start active.
    pub fn new(width: usize, height: usize, rng: &mut impl Rng) -> Self {
        let rows = (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| Cell {
                        color: TileColor::random(rng),
                        active: true,
                    })
                    .collect()
            })
            .collect();
        Self {
            width,
            height,
            rows,
        }
    }

    #[cfg(test)]
    /// Build a board from explicit colours, bottom row first. Rows must share one length.
    pub fn from_rows(rows: &[&[TileColor]]) -> Self {
        let width = rows.first().map_or(0, |r| r.len());
        let rows: Vec<Vec<Cell>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&color| Cell {
                        color,
                        active: true,
                    })
                    .collect()
            })
            .collect();
        debug_assert!(rows.iter().all(|r| r.len() == width));
        Self {
            width,
            height: rows.len(),
            rows,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Cell at (x, y); `None` when out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    fn cell_mut(&mut self, pos: Pos) -> Option<&mut Cell> {
        self.rows.get_mut(pos.y).and_then(|row| row.get_mut(pos.x))
    }

    /// Re-randomise every colour in place. Activity flags are left alone.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        for cell in self.rows.iter_mut().flatten() {
            cell.color = TileColor::random(rng);
        }
    }

    /// Active in-bounds 4-neighbours of (x, y), ordered up, down, left, right.
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(Pos, Cell)> {
        DIRECTIONS
            .iter()
            .filter_map(|&(dx, dy)| {
                let nx = x.checked_add_signed(dx)?;
                let ny = y.checked_add_signed(dy)?;
                let cell = self.get(nx, ny)?;
                cell.active.then_some((Pos::new(nx, ny), cell))
            })
            .collect()
    }

    /// Mark cells inactive. Returns the positions that actually changed.
    pub fn deactivate(&mut self, cells: &[Pos]) -> Vec<Pos> {
        let mut changed = Vec::with_capacity(cells.len());
        for &pos in cells {
            if let Some(cell) = self.cell_mut(pos) {
                if cell.active {
                    cell.active = false;
                    changed.push(pos);
                }
            }
        }
        changed
    }

    /// Give each cell a fresh random colour and reactivate it.
    /// Returns the new colour per regenerated (in-bounds) position.
    pub fn regenerate(&mut self, cells: &[Pos], rng: &mut impl Rng) -> Vec<(Pos, TileColor)> {
        let mut out = Vec::with_capacity(cells.len());
        for &pos in cells {
            if let Some(cell) = self.cell_mut(pos) {
                cell.color = TileColor::random(rng);
                cell.active = true;
                out.push((pos, cell.color));
            }
        }
        out
    }

    /// Recolour cells in place (colour converter). Out-of-bounds positions are skipped.
    pub fn recolor(&mut self, cells: &[Pos], color: TileColor) -> Vec<Pos> {
        let mut changed = Vec::with_capacity(cells.len());
        for &pos in cells {
            if let Some(cell) = self.cell_mut(pos) {
                cell.color = color;
                changed.push(pos);
            }
        }
        changed
    }

    /// All active cells grouped by colour. Colours with no active cell are absent.
    pub fn cells_by_color(&self) -> BTreeMap<TileColor, BTreeSet<Pos>> {
        let mut groups: BTreeMap<TileColor, BTreeSet<Pos>> = BTreeMap::new();
        for (y, row) in self.rows.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if cell.active {
                    groups.entry(cell.color).or_default().insert(Pos::new(x, y));
                }
            }
        }
        groups
    }

    /// Bulk toggle of interactivity. Colours are untouched.
    pub fn set_all_active(&mut self, active: bool) {
        for cell in self.rows.iter_mut().flatten() {
            cell.active = active;
        }
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use TileColor::{Blue, Green, Red, Yellow};

    #[test]
    fn test_new_grid_dimensions_and_all_active() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = Grid::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, &mut rng);
        assert_eq!(grid.width(), 6);
        assert_eq!(grid.height(), 8);
        assert_eq!(grid.active_count(), 48);
    }

    #[test]
    fn test_get_out_of_bounds_is_none() {
        let grid = Grid::from_rows(&[&[Red, Blue], &[Green, Yellow]]);
        assert_eq!(grid.get(1, 1).map(|c| c.color), Some(Yellow));
        assert!(grid.get(2, 0).is_none());
        assert!(grid.get(0, 2).is_none());
        assert!(grid.get(usize::MAX, 0).is_none());
    }

    #[test]
    fn test_neighbors_order_up_down_left_right() {
        let grid = Grid::from_rows(&[
            &[Red, Red, Red],
            &[Red, Red, Red],
            &[Red, Red, Red],
        ]);
        let order: Vec<Pos> = grid.neighbors(1, 1).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            order,
            vec![Pos::new(1, 2), Pos::new(1, 0), Pos::new(0, 1), Pos::new(2, 1)]
        );
    }

    #[test]
    fn test_neighbors_skip_inactive_and_edges() {
        let mut grid = Grid::from_rows(&[&[Red, Blue], &[Green, Yellow]]);
        grid.deactivate(&[Pos::new(1, 0)]);
        let order: Vec<Pos> = grid.neighbors(0, 0).into_iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec![Pos::new(0, 1)]);
    }

    #[test]
    fn test_deactivate_keeps_colour_and_reports_changes() {
        let mut grid = Grid::from_rows(&[&[Red, Blue]]);
        let changed = grid.deactivate(&[Pos::new(0, 0), Pos::new(0, 0), Pos::new(5, 5)]);
        assert_eq!(changed, vec![Pos::new(0, 0)]);
        let cell = grid.get(0, 0).unwrap();
        assert!(!cell.active);
        assert_eq!(cell.color, Red);
    }

    #[test]
    fn test_regenerate_reactivates() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut grid = Grid::from_rows(&[&[Red, Blue]]);
        grid.deactivate(&[Pos::new(0, 0), Pos::new(1, 0)]);
        let out = grid.regenerate(&[Pos::new(0, 0), Pos::new(1, 0)], &mut rng);
        assert_eq!(out.len(), 2);
        assert_eq!(grid.active_count(), 2);
        for (pos, color) in out {
            assert_eq!(grid.get(pos.x, pos.y).unwrap().color, color);
        }
    }

    #[test]
    fn test_cells_by_color_only_active() {
        let mut grid = Grid::from_rows(&[&[Red, Red, Blue], &[Green, Red, Blue]]);
        grid.deactivate(&[Pos::new(2, 1)]);
        let groups = grid.cells_by_color();
        assert_eq!(groups[&Red].len(), 3);
        assert_eq!(groups[&Blue].len(), 1);
        assert_eq!(groups[&Green].len(), 1);
        assert!(!groups.contains_key(&Yellow));
    }

    #[test]
    fn test_set_all_active_preserves_colours() {
        let mut grid = Grid::from_rows(&[&[Red, Blue, Green]]);
        let before = grid.clone();
        grid.set_all_active(false);
        assert_eq!(grid.active_count(), 0);
        grid.set_all_active(true);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_reset_is_seed_deterministic() {
        let row: &[TileColor] = &[Red; 6];
        let mut a = Grid::from_rows(&[row; 8]);
        let mut b = a.clone();
        a.reset(&mut StdRng::seed_from_u64(42));
        b.reset(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}

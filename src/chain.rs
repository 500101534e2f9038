//! Chain search: breadth-first flood over same-colour active neighbours.

use crate::grid::{Grid, Pos, TileColor};
use std::collections::{HashSet, VecDeque};

/// Default minimum number of tiles for a chain to count.
pub const DEFAULT_MIN_CHAIN: usize = 2;

/// Cells found by one search, in traversal order (seed first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub color: Option<TileColor>,
    pub cells: Vec<Pos>,
}

impl Chain {
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Result of validating a search against the minimum size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Long enough: score it, clear it.
    Valid(Chain),
    /// Too short: feedback only.
    TooShort(Chain),
}

/// Maximal 4-connected region of active cells sharing the seed's colour.
/// An out-of-bounds or inactive seed yields an empty chain.
pub fn find_chain(grid: &Grid, seed: Pos) -> Chain {
    let Some(start) = grid.get(seed.x, seed.y).filter(|c| c.active) else {
        return Chain {
            color: None,
            cells: Vec::new(),
        };
    };
    let color = start.color;
    let mut cells = Vec::new();
    let mut visited = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);

    while let Some(pos) = queue.pop_front() {
        cells.push(pos);
        for (npos, ncell) in grid.neighbors(pos.x, pos.y) {
            if ncell.color == color && visited.insert(npos) {
                queue.push_back(npos);
            }
        }
    }

    Chain {
        color: Some(color),
        cells,
    }
}

/// Search plus minimum-size rule.
#[derive(Debug, Clone, Copy)]
pub struct ChainFinder {
    pub min_size: usize,
}

impl Default for ChainFinder {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CHAIN,
        }
    }
}

impl ChainFinder {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }

    pub fn evaluate(&self, grid: &Grid, seed: Pos) -> ChainOutcome {
        let chain = find_chain(grid, seed);
        if chain.len() < self.min_size || chain.is_empty() {
            ChainOutcome::TooShort(chain)
        } else {
            ChainOutcome::Valid(chain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use TileColor::{Blue, Green, Red, Yellow};

    fn sorted(mut cells: Vec<Pos>) -> Vec<Pos> {
        cells.sort();
        cells
    }

    /// Reference region by repeated expansion, independent of the BFS.
    fn region_by_fixpoint(grid: &Grid, seed: Pos) -> Vec<Pos> {
        let Some(start) = grid.get(seed.x, seed.y).filter(|c| c.active) else {
            return Vec::new();
        };
        let mut region: HashSet<Pos> = HashSet::from([seed]);
        loop {
            let mut grown = region.clone();
            for p in &region {
                for (n, c) in grid.neighbors(p.x, p.y) {
                    if c.color == start.color {
                        grown.insert(n);
                    }
                }
            }
            if grown.len() == region.len() {
                break;
            }
            region = grown;
        }
        sorted(region.into_iter().collect())
    }

    #[test]
    fn test_strip_of_three_red_plus_blue() {
        let grid = Grid::from_rows(&[&[Red, Red, Red, Blue]]);
        let chain = find_chain(&grid, Pos::new(1, 0));
        assert_eq!(chain.color, Some(Red));
        assert_eq!(
            sorted(chain.cells),
            vec![Pos::new(0, 0), Pos::new(1, 0), Pos::new(2, 0)]
        );
    }

    #[test]
    fn test_diagonal_is_not_connected() {
        let grid = Grid::from_rows(&[&[Red, Blue], &[Blue, Red]]);
        let chain = find_chain(&grid, Pos::new(0, 0));
        assert_eq!(chain.cells, vec![Pos::new(0, 0)]);
    }

    #[test]
    fn test_inactive_cells_break_chain() {
        let mut grid = Grid::from_rows(&[&[Red, Red, Red]]);
        grid.deactivate(&[Pos::new(1, 0)]);
        let chain = find_chain(&grid, Pos::new(0, 0));
        assert_eq!(chain.cells, vec![Pos::new(0, 0)]);
    }

    #[test]
    fn test_inactive_or_missing_seed_is_empty() {
        let mut grid = Grid::from_rows(&[&[Red, Red]]);
        assert!(find_chain(&grid, Pos::new(9, 9)).is_empty());
        grid.deactivate(&[Pos::new(0, 0)]);
        let chain = find_chain(&grid, Pos::new(0, 0));
        assert!(chain.is_empty());
        assert_eq!(chain.color, None);
    }

    #[test]
    fn test_seed_is_first_and_no_duplicates() {
        let grid = Grid::from_rows(&[
            &[Green, Green, Green],
            &[Green, Yellow, Green],
            &[Green, Green, Green],
        ]);
        let chain = find_chain(&grid, Pos::new(2, 2));
        assert_eq!(chain.cells[0], Pos::new(2, 2));
        assert_eq!(chain.len(), 8);
        let unique: HashSet<_> = chain.cells.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_matches_reference_region_on_random_grids() {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        for _ in 0..50 {
            let mut grid = Grid::new(6, 8, &mut rng);
            grid.deactivate(&[Pos::new(2, 3), Pos::new(4, 1), Pos::new(0, 7)]);
            for y in 0..8 {
                for x in 0..6 {
                    let seed = Pos::new(x, y);
                    let chain = find_chain(&grid, seed);
                    assert_eq!(sorted(chain.cells), region_by_fixpoint(&grid, seed));
                }
            }
        }
    }

    #[test]
    fn test_evaluate_applies_minimum() {
        let grid = Grid::from_rows(&[&[Red, Blue, Blue]]);
        let finder = ChainFinder::default();
        assert!(matches!(
            finder.evaluate(&grid, Pos::new(0, 0)),
            ChainOutcome::TooShort(c) if c.len() == 1
        ));
        assert!(matches!(
            finder.evaluate(&grid, Pos::new(1, 0)),
            ChainOutcome::Valid(c) if c.len() == 2
        ));
        let strict = ChainFinder::new(3);
        assert!(matches!(
            strict.evaluate(&grid, Pos::new(2, 0)),
            ChainOutcome::TooShort(_)
        ));
    }
}

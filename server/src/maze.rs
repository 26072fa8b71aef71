//! Procedural maze generation
//!
//! Mazes are carved with a randomized depth-first traversal over the odd
//! coordinate lattice. Carved cells always sit on odd coordinates with a
//! one-cell wall between corridors, and the outer border ring is never
//! touched. The result is a spanning tree over every interior odd cell, so
//! every open cell is reachable from the start.

use crowdmaze_shared::{Cell, Grid, Position, START};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

pub const MIN_MAZE_SIZE: usize = 5;
/// Largest side whose encoded snapshot still fits in one UDP datagram.
pub const MAX_MAZE_SIZE: usize = 101;

/// Lattice steps explored from each carved cell.
const CARVE_STEPS: [(isize, isize); 4] = [(0, -2), (0, 2), (-2, 0), (2, 0)];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MazeError {
    #[error("maze size must be at most {max}, got {0}", max = MAX_MAZE_SIZE)]
    TooLarge(usize),
    #[error("maze size must be odd, got {0}")]
    EvenSize(usize),
    #[error("maze size must be at least {min}, got {0}", min = MIN_MAZE_SIZE)]
    TooSmall(usize),
    #[error("exit {exit} is not inside the interior of a {size}x{size} maze")]
    ExitOutOfBounds { exit: Position, size: usize },
    #[error("exit must differ from the start cell")]
    ExitAtStart,
}

/// Checks that a maze of `size` with the given exit can be generated.
pub fn validate(size: usize, exit: Position) -> Result<(), MazeError> {
    if size < MIN_MAZE_SIZE {
        return Err(MazeError::TooSmall(size));
    }
    if size > MAX_MAZE_SIZE {
        return Err(MazeError::TooLarge(size));
    }
    if size % 2 == 0 {
        return Err(MazeError::EvenSize(size));
    }
    if !is_interior(exit.x, size) || !is_interior(exit.y, size) {
        return Err(MazeError::ExitOutOfBounds { exit, size });
    }
    if exit == START {
        return Err(MazeError::ExitAtStart);
    }
    Ok(())
}

/// Generates a new maze of `size` cells per side, carved from the start cell.
///
/// The exit cell and its two neighbours toward the start are forced open after
/// carving, so the exit is reachable even when it does not fall on the odd
/// lattice.
pub fn generate<R: Rng + ?Sized>(
    size: usize,
    exit: Position,
    rng: &mut R,
) -> Result<Grid, MazeError> {
    validate(size, exit)?;

    let mut grid = Grid::filled(size);
    let mut visited = vec![vec![false; size]; size];
    let mut stack = vec![START];

    grid.set(START, Cell::Open);
    visited[START.y][START.x] = true;

    while let Some(&current) = stack.last() {
        let candidates: Vec<Position> = CARVE_STEPS
            .iter()
            .filter_map(|&(dx, dy)| {
                let x = current.x.checked_add_signed(dx)?;
                let y = current.y.checked_add_signed(dy)?;
                let inside = is_interior(x, size) && is_interior(y, size);
                (inside && !visited[y][x]).then_some(Position::new(x, y))
            })
            .collect();

        match candidates.choose(&mut *rng) {
            Some(&next) => {
                let wall = Position::new((current.x + next.x) / 2, (current.y + next.y) / 2);
                grid.set(wall, Cell::Open);
                grid.set(next, Cell::Open);
                visited[next.y][next.x] = true;
                stack.push(next);
            }
            None => {
                stack.pop();
            }
        }
    }

    open_exit(&mut grid, exit);

    debug!(
        "Generated {}x{} maze with {} open cells",
        size,
        size,
        grid.open_cells().count()
    );
    Ok(grid)
}

fn is_interior(coord: usize, size: usize) -> bool {
    coord > 0 && coord < size - 1
}

fn open_exit(grid: &mut Grid, exit: Position) {
    grid.set(exit, Cell::Open);
    grid.set(Position::new(toward(exit.x, START.x), exit.y), Cell::Open);
    grid.set(Position::new(exit.x, toward(exit.y, START.y)), Cell::Open);
}

/// One step from `from` in the direction of `target`.
fn toward(from: usize, target: usize) -> usize {
    if from > target {
        from - 1
    } else if from < target {
        from + 1
    } else {
        from
    }
}

use crowdmaze_shared::{Direction, Grid, Position};

/// Result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub position: Position,
    pub reached_exit: bool,
}

/// Moves one cell in `direction` if the target is inside the grid and open.
/// Blocked moves return `None` and leave the caller's position untouched.
pub fn try_move(
    position: Position,
    direction: Direction,
    grid: &Grid,
    exit: Position,
) -> Option<Move> {
    let target = position.step(direction, grid.size())?;

    if !grid.is_open(target) {
        return None;
    }

    Some(Move {
        position: target,
        reached_exit: target == exit,
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAZE_SIZE: usize = 15;
pub const ROUND_SECONDS: u32 = 60;
pub const EXIT_RESET_SECONDS: u32 = 10;
pub const PROTOCOL_VERSION: u32 = 1;
pub const START: Position = Position { x: 1, y: 1 };

/// Exit cell used when none is configured: the interior corner opposite the start.
pub fn default_exit(size: usize) -> Position {
    Position::new(size.saturating_sub(2), size.saturating_sub(2))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    /// Direction travels as the raw token so the server can reject bad ones.
    Vote {
        direction: String,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    GameState {
        snapshot: GameSnapshot,
    },
    PlayersUpdate {
        players: u32,
    },
    VoteRejected {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Unit step on the grid. `y` grows downwards, so `Up` is `-1`.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid direction token: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Neighbouring position one step in `direction`, if it stays inside a
    /// `size` x `size` grid.
    pub fn step(self, direction: Direction, size: usize) -> Option<Position> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;

        if x < size && y < size {
            Some(Position::new(x, y))
        } else {
            None
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Wall,
    Open,
}

/// Square maze grid stored row-major, indexed `[y][x]`.
///
/// Serializes as a bare matrix of rows so clients can read `maze[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<Cell>>", try_from = "Vec<Vec<Cell>>")]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("maze rows must all have {expected} cells, row {row} has {found}")]
pub struct GridShapeError {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

impl Grid {
    /// A grid where every cell is a wall.
    pub fn filled(size: usize) -> Self {
        Self {
            cells: vec![vec![Cell::Wall; size]; size],
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, pos: Position) -> Option<Cell> {
        self.cells.get(pos.y).and_then(|row| row.get(pos.x)).copied()
    }

    pub fn is_open(&self, pos: Position) -> bool {
        self.cell(pos) == Some(Cell::Open)
    }

    /// Sets a cell, returning false when `pos` is outside the grid.
    pub fn set(&mut self, pos: Position, cell: Cell) -> bool {
        match self.cells.get_mut(pos.y).and_then(|row| row.get_mut(pos.x)) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn open_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| **cell == Cell::Open)
                .map(move |(x, _)| Position::new(x, y))
        })
    }
}

impl From<Grid> for Vec<Vec<Cell>> {
    fn from(grid: Grid) -> Self {
        grid.cells
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Grid {
    type Error = GridShapeError;

    fn try_from(cells: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        let expected = cells.len();
        if let Some((row, found)) = cells
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != expected)
        {
            return Err(GridShapeError {
                row,
                expected,
                found,
            });
        }
        Ok(Self { cells })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub up: u32,
    pub down: u32,
    pub left: u32,
    pub right: u32,
}

impl VoteCounts {
    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn increment(&mut self, direction: Direction) {
        let slot = match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        Direction::ALL.iter().map(|d| self.get(*d)).sum()
    }

    /// Directions sharing the highest non-zero count.
    pub fn leaders(&self) -> Vec<Direction> {
        let max = Direction::ALL
            .iter()
            .map(|d| self.get(*d))
            .max()
            .unwrap_or(0);

        if max == 0 {
            return Vec::new();
        }

        Direction::ALL
            .into_iter()
            .filter(|d| self.get(*d) == max)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Voting,
    AtExit,
    ResetPending,
}

/// Point-in-time copy of the authoritative game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub maze: Grid,
    pub player_pos: Position,
    pub exit_pos: Position,
    pub votes: VoteCounts,
    pub time_left: u32,
    pub at_exit: bool,
    pub phase: Phase,
    pub connected_players: u32,
    pub round: u64,
    pub escapes: u64,
}

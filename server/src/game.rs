use crate::votes::VoteTally;
use crowdmaze_shared::{GameSnapshot, Grid, Phase, Position, START};
use log::info;

/// The authoritative game aggregate. Only the round clock mutates it.
#[derive(Debug, Clone)]
pub struct GameState {
    pub grid: Grid,
    pub player: Position,
    pub exit: Position,
    pub votes: VoteTally,
    pub phase: Phase,
    pub time_left: u32,
    pub participants: u32,
    /// Voting rounds resolved since startup.
    pub round: u64,
    /// Times the exit has been reached since startup.
    pub escapes: u64,
}

impl GameState {
    pub fn new(grid: Grid, exit: Position, round_seconds: u32) -> Self {
        Self {
            grid,
            player: START,
            exit,
            votes: VoteTally::new(),
            phase: Phase::Voting,
            time_left: round_seconds,
            participants: 0,
            round: 0,
            escapes: 0,
        }
    }

    pub fn add_participant(&mut self) -> u32 {
        self.participants = self.participants.saturating_add(1);
        info!("Participant joined ({} connected)", self.participants);
        self.participants
    }

    /// Never drops below zero, even for unmatched disconnects.
    pub fn remove_participant(&mut self) -> u32 {
        self.participants = self.participants.saturating_sub(1);
        info!("Participant left ({} connected)", self.participants);
        self.participants
    }

    pub fn at_exit(&self) -> bool {
        self.phase == Phase::AtExit
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            maze: self.grid.clone(),
            player_pos: self.player,
            exit_pos: self.exit,
            votes: self.votes.counts(),
            time_left: self.time_left,
            at_exit: self.at_exit(),
            phase: self.phase,
            connected_players: self.participants,
            round: self.round,
            escapes: self.escapes,
        }
    }
}

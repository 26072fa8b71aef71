//! Anonymous direction voting
//!
//! Every accepted message counts as one vote. There is no participant
//! identity, so one voter may vote any number of times per round.

use crowdmaze_shared::{Direction, Phase, VoteCounts};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),
    #[error("voting is closed during the {0:?} phase")]
    InvalidPhase(Phase),
}

/// Running vote counts for the current round.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    counts: VoteCounts,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one vote for `token` and returns the updated counts.
    ///
    /// Votes are only accepted while `phase` is [`Phase::Voting`] and the
    /// token names one of the four directions exactly.
    pub fn record(&mut self, phase: Phase, token: &str) -> Result<VoteCounts, VoteError> {
        let direction: Direction = token
            .parse()
            .map_err(|_| VoteError::InvalidDirection(token.to_string()))?;

        if phase != Phase::Voting {
            return Err(VoteError::InvalidPhase(phase));
        }

        self.counts.increment(direction);
        Ok(self.counts)
    }

    /// Picks the winning direction, breaking ties uniformly at random.
    /// Returns `None` when nobody voted.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Direction> {
        self.counts.leaders().choose(rng).copied()
    }

    pub fn reset(&mut self) {
        self.counts = VoteCounts::default();
    }

    pub fn counts(&self) -> VoteCounts {
        self.counts
    }
}

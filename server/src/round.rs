//! Round timing state machine
//!
//! The clock owns the [`GameState`] and is the only thing allowed to mutate
//! it. It is driven by one [`RoundClock::tick`] per second plus inbound
//! votes and participant changes, all of which must arrive on a single
//! logical sequence (see `network::Server::run`).
//!
//! ```text
//!  VOTING --(countdown hits 0, move lands on exit)--> AT_EXIT
//!    ^  \__(countdown hits 0, otherwise)__/             |
//!    |                                      (countdown hits 0)
//!    +---------------- RESET_PENDING <------------------+
//! ```
//!
//! Every tick and every accepted vote sends a fresh snapshot to the
//! [`StateBroadcaster`].

use crate::broadcast::StateBroadcaster;
use crate::config::{ConfigError, GameSettings};
use crate::game::GameState;
use crate::maze;
use crate::movement::try_move;
use crate::votes::VoteError;
use crowdmaze_shared::{Direction, GameSnapshot, Phase, Position, VoteCounts, START};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What a single tick did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown decremented, nothing else happened.
    Counting,
    /// Round ended without any votes.
    NoVotes,
    Moved { direction: Direction, to: Position },
    /// Winning direction pointed into a wall or off the grid.
    Blocked(Direction),
    ReachedExit,
    /// A fresh maze was generated after the exit delay.
    Reset,
}

pub struct RoundClock<B, R = StdRng> {
    state: GameState,
    settings: GameSettings,
    broadcaster: B,
    rng: R,
}

impl<B: StateBroadcaster> RoundClock<B, StdRng> {
    /// Builds a clock using the configured seed, or entropy when none is set.
    pub fn new(settings: GameSettings, broadcaster: B) -> Result<Self, ConfigError> {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(settings, broadcaster, rng)
    }
}

impl<B: StateBroadcaster, R: Rng> RoundClock<B, R> {
    pub fn with_rng(
        settings: GameSettings,
        broadcaster: B,
        mut rng: R,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let grid = maze::generate(settings.maze_size, settings.exit, &mut rng)?;
        let state = GameState::new(grid, settings.exit, settings.round_seconds);

        info!(
            "Round clock ready: {}x{} maze, exit at {}, {}s rounds",
            settings.maze_size, settings.maze_size, settings.exit, settings.round_seconds
        );

        Ok(Self {
            state,
            settings,
            broadcaster,
            rng,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.state.snapshot()
    }

    /// Records a vote and broadcasts the new state when it is accepted.
    pub fn vote(&mut self, token: &str) -> Result<VoteCounts, VoteError> {
        let counts = self.state.votes.record(self.state.phase, token)?;
        debug!("Vote for {} accepted ({} this round)", token, counts.total());
        self.publish();
        Ok(counts)
    }

    /// Registers a new participant and returns the snapshot to send them.
    pub fn participant_joined(&mut self) -> GameSnapshot {
        let count = self.state.add_participant();
        self.broadcaster.notify_participant_count(count);
        self.state.snapshot()
    }

    pub fn participant_left(&mut self) -> u32 {
        let count = self.state.remove_participant();
        self.broadcaster.notify_participant_count(count);
        count
    }

    /// Advances the clock by one second.
    pub fn tick(&mut self) -> TickOutcome {
        self.state.time_left = self.state.time_left.saturating_sub(1);

        let outcome = if self.state.time_left > 0 {
            TickOutcome::Counting
        } else {
            match self.state.phase {
                Phase::Voting => self.resolve_round(),
                Phase::AtExit | Phase::ResetPending => self.reset(),
            }
        };

        self.publish();
        outcome
    }

    /// Starts over on a fresh maze regardless of the current phase.
    pub fn restart(&mut self) -> GameSnapshot {
        info!("Restart requested in {:?} phase", self.state.phase);
        self.reset();
        self.publish();
        self.state.snapshot()
    }

    fn resolve_round(&mut self) -> TickOutcome {
        self.state.round += 1;
        let winner = self.state.votes.resolve(&mut self.rng);
        self.state.votes.reset();

        let outcome = match winner {
            None => TickOutcome::NoVotes,
            Some(direction) => {
                match try_move(self.state.player, direction, &self.state.grid, self.state.exit) {
                    None => TickOutcome::Blocked(direction),
                    Some(step) => {
                        self.state.player = step.position;
                        if step.reached_exit {
                            TickOutcome::ReachedExit
                        } else {
                            TickOutcome::Moved {
                                direction,
                                to: step.position,
                            }
                        }
                    }
                }
            }
        };

        if outcome == TickOutcome::ReachedExit {
            self.state.escapes += 1;
            self.state.phase = Phase::AtExit;
            self.state.time_left = self.settings.exit_seconds;
            info!(
                "Exit reached after round {}; new maze in {}s",
                self.state.round, self.settings.exit_seconds
            );
        } else {
            self.state.time_left = self.settings.round_seconds;
            debug!("Round {} resolved: {:?}", self.state.round, outcome);
        }

        outcome
    }

    fn reset(&mut self) -> TickOutcome {
        self.state.phase = Phase::ResetPending;

        // Settings are validated at construction; keep the old maze if this still fails.
        match maze::generate(self.settings.maze_size, self.settings.exit, &mut self.rng) {
            Ok(grid) => self.state.grid = grid,
            Err(e) => error!("Maze regeneration failed, reusing maze: {}", e),
        }

        self.state.player = START;
        self.state.votes.reset();
        self.state.phase = Phase::Voting;
        self.state.time_left = self.settings.round_seconds;

        info!("Maze reset, voting reopened");
        TickOutcome::Reset
    }

    fn publish(&self) {
        self.broadcaster.broadcast(self.state.snapshot());
    }
}

use crate::maze::{self, MazeError};
use crowdmaze_shared::{default_exit, Position, EXIT_RESET_SECONDS, MAZE_SIZE, ROUND_SECONDS};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Maze(#[from] MazeError),
    #[error("round length must be at least one second")]
    ZeroRoundLength,
    #[error("exit delay must be at least one second")]
    ZeroExitDelay,
}

/// Tunables for the round clock and maze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    pub maze_size: usize,
    pub exit: Position,
    /// Seconds in a voting round.
    pub round_seconds: u32,
    /// Seconds spent at the exit before the maze is regenerated.
    pub exit_seconds: u32,
    /// Fixed RNG seed; entropy is used when absent.
    pub seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            maze_size: MAZE_SIZE,
            exit: default_exit(MAZE_SIZE),
            round_seconds: ROUND_SECONDS,
            exit_seconds: EXIT_RESET_SECONDS,
            seed: None,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        maze::validate(self.maze_size, self.exit)?;

        if self.round_seconds == 0 {
            return Err(ConfigError::ZeroRoundLength);
        }
        if self.exit_seconds == 0 {
            return Err(ConfigError::ZeroExitDelay);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = GameSettings::default();
        assert_eq!(settings.maze_size, 15);
        assert_eq!(settings.exit, Position::new(13, 13));
        assert_eq!(settings.round_seconds, 60);
        assert_eq!(settings.exit_seconds, 10);
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_oversized_maze() {
        let settings = GameSettings {
            maze_size: 131,
            exit: default_exit(131),
            ..GameSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::Maze(MazeError::TooLarge(131)))
        );
    }

    #[test]
    fn test_rejects_bad_timers() {
        let settings = GameSettings {
            round_seconds: 0,
            ..GameSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::ZeroRoundLength));

        let settings = GameSettings {
            exit_seconds: 0,
            ..GameSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::ZeroExitDelay));
    }

    #[test]
    fn test_rejects_bad_maze() {
        let settings = GameSettings {
            maze_size: 16,
            ..GameSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::Maze(MazeError::EvenSize(16)))
        );

        let settings = GameSettings {
            exit: Position::new(0, 13),
            ..GameSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Maze(MazeError::ExitOutOfBounds { .. }))
        ));
    }
}

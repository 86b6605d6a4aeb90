//! Error types for playcore
//!
//! This module defines the error taxonomy of the player control plane.
//! Synchronous precondition failures (`IllegalState`, `InvalidArgument`)
//! are returned to the caller; engine failures are additionally reported
//! through the message queue. Queue abort is not an error and lives in
//! [`crate::message::MessagePoll`].

use crate::player::{Command, PlayerState};
use thiserror::Error;

/// Generic failure code used by the C-style host API
pub const CODE_FAILED: i32 = -1;

/// Command not valid in the current state
pub const CODE_INVALID_STATE: i32 = -3;

/// Missing or malformed argument
pub const CODE_INVALID_ARGUMENT: i32 = -4;

/// Main error type for playcore
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Command not legal in the current state; no side effect was performed
    #[error("Illegal state: cannot {command} while {state}")]
    IllegalState {
        state: PlayerState,
        command: Command,
    },

    /// Malformed input, e.g. an empty URL
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the engine collaborator
    #[error("Engine error ({code}): {message}")]
    Engine { code: i32, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process-wide registry misuse (uninitialized, double registration)
    #[error("Registry error: {0}")]
    Registry(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlayerError {
    /// Create an engine error with the generic failure code
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        PlayerError::Engine {
            code: CODE_FAILED,
            message: msg.into(),
        }
    }

    /// Integer code for hosts that speak the original C convention
    pub fn code(&self) -> i32 {
        match self {
            PlayerError::IllegalState { .. } => CODE_INVALID_STATE,
            PlayerError::InvalidArgument(_) => CODE_INVALID_ARGUMENT,
            PlayerError::Engine { code, .. } if *code < 0 => *code,
            _ => CODE_FAILED,
        }
    }

    /// Whether this is a state-machine rejection
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, PlayerError::IllegalState { .. })
    }
}

/// Convenience type alias for Results in playcore
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Extension trait for converting other errors to PlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a PlayerError with the given context
    fn config_err(self, context: &str) -> Result<T>;
    fn engine_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Config(format!("{}: {}", context, e)))
    }

    fn engine_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::engine(format!("{}: {}", context, e)))
    }
}

/// Helper macro for creating internal errors with file and line information
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::utils::error::PlayerError::Internal(
            format!("{} at {}:{}", $msg, file!(), line!())
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::PlayerError::Internal(
            format!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
        )
    };
}

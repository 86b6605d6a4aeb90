//! Playback state machine for playcore
//!
//! This module holds the authoritative record of a player's playback phase
//! and the table of legal transitions. [`transition`] is the pure table
//! lookup; [`StateMachine`] applies it atomically under one lock and tracks
//! the engine session number used to discard stale engine callbacks.

use crate::utils::error::{PlayerError, Result};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback phase of a player handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Initialized,
    AsyncPreparing,
    Prepared,
    Started,
    Paused,
    Completed,
    Stopped,
    Error,
    End,
}

impl PlayerState {
    /// Every state, in declaration order
    pub const ALL: [PlayerState; 10] = [
        PlayerState::Idle,
        PlayerState::Initialized,
        PlayerState::AsyncPreparing,
        PlayerState::Prepared,
        PlayerState::Started,
        PlayerState::Paused,
        PlayerState::Completed,
        PlayerState::Stopped,
        PlayerState::Error,
        PlayerState::End,
    ];

    /// Numeric value used by the original C API (`MP_STATE_*`)
    pub fn code(self) -> i32 {
        match self {
            PlayerState::Idle => 0,
            PlayerState::Initialized => 1,
            PlayerState::AsyncPreparing => 2,
            PlayerState::Prepared => 3,
            PlayerState::Started => 4,
            PlayerState::Paused => 5,
            PlayerState::Completed => 6,
            PlayerState::Stopped => 7,
            PlayerState::Error => 8,
            PlayerState::End => 9,
        }
    }

    /// Whether an engine collaborator may exist in this state
    pub fn allows_engine(self) -> bool {
        !matches!(self, PlayerState::Idle | PlayerState::End)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "IDLE",
            PlayerState::Initialized => "INITIALIZED",
            PlayerState::AsyncPreparing => "ASYNC_PREPARING",
            PlayerState::Prepared => "PREPARED",
            PlayerState::Started => "STARTED",
            PlayerState::Paused => "PAUSED",
            PlayerState::Completed => "COMPLETED",
            PlayerState::Stopped => "STOPPED",
            PlayerState::Error => "ERROR",
            PlayerState::End => "END",
        };
        f.write_str(name)
    }
}

/// Input to the state machine: an application command or an engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    SetDataSource,
    PrepareAsync,
    Start,
    Pause,
    Stop,
    SeekTo,
    Reset,
    /// Teardown; legal everywhere, terminal
    Release,
    /// Engine finished opening the source
    OnPrepared,
    /// Engine reached end of stream
    OnCompleted,
    /// Engine failed
    OnError,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::SetDataSource,
        Command::PrepareAsync,
        Command::Start,
        Command::Pause,
        Command::Stop,
        Command::SeekTo,
        Command::Reset,
        Command::Release,
        Command::OnPrepared,
        Command::OnCompleted,
        Command::OnError,
    ];

    /// Whether this input comes from the engine rather than the application
    pub fn is_engine_event(self) -> bool {
        matches!(self, Command::OnPrepared | Command::OnCompleted | Command::OnError)
    }

    /// Whether applying this command invalidates callbacks of the current engine
    fn starts_session(self) -> bool {
        matches!(self, Command::PrepareAsync | Command::Reset | Command::Release)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::SetDataSource => "set data source",
            Command::PrepareAsync => "prepare",
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::SeekTo => "seek",
            Command::Reset => "reset",
            Command::Release => "release",
            Command::OnPrepared => "complete preparation",
            Command::OnCompleted => "complete playback",
            Command::OnError => "enter error",
        };
        f.write_str(name)
    }
}

/// Look up the state reached by applying `command` in `current`.
///
/// Returns `IllegalState` for every pair missing from the transition table.
pub fn transition(current: PlayerState, command: Command) -> Result<PlayerState> {
    use Command::*;
    use PlayerState::*;

    let next = match (current, command) {
        (_, Release) => Some(End),
        (End, _) => None,

        (_, Reset) => Some(Idle),

        (Idle, SetDataSource) => Some(Initialized),

        (Initialized | Stopped, PrepareAsync) => Some(AsyncPreparing),

        (Prepared | Started | Paused | Completed, Start) => Some(Started),

        (Started | Paused, Pause) => Some(Paused),
        (Completed, Pause) => Some(Completed),

        (Started | Paused | Completed | Stopped, Stop) => Some(Stopped),

        (Prepared | Started | Paused | Completed, SeekTo) => Some(current),

        (AsyncPreparing, OnPrepared) => Some(Prepared),
        (Started, OnCompleted) => Some(Completed),
        (Stopped | Error, OnError) => None,
        (_, OnError) => Some(Error),

        _ => None,
    };

    next.ok_or(PlayerError::IllegalState {
        state: current,
        command,
    })
}

/// A committed state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PlayerState,
    pub to: PlayerState,
    pub command: Command,
    /// Engine session current after the commit
    pub session: u64,
}

impl Transition {
    /// Whether the command was accepted without changing state
    pub fn is_self(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    state: PlayerState,
    session: u64,
}

/// Linearizable state holder for one player handle
pub struct StateMachine {
    tracked: Mutex<Tracked>,
}

impl StateMachine {
    /// Create a machine in `IDLE`, session 0
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked {
                state: PlayerState::Idle,
                session: 0,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> PlayerState {
        self.tracked.lock().state
    }

    /// Current engine session
    pub fn session(&self) -> u64 {
        self.tracked.lock().session
    }

    /// Validate and commit `command` in one step
    pub fn apply(&self, command: Command) -> Result<Transition> {
        self.lock().apply(command)
    }

    /// Check legality without committing
    pub fn check(&self, command: Command) -> Result<PlayerState> {
        transition(self.state(), command)
    }

    /// Hold the transition lock.
    ///
    /// Callers that must publish something strictly after a commit (e.g. a
    /// message reporting it) do so while still holding the guard.
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            tracked: self.tracked.lock(),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the state field
pub struct StateGuard<'a> {
    tracked: MutexGuard<'a, Tracked>,
}

impl StateGuard<'_> {
    pub fn state(&self) -> PlayerState {
        self.tracked.state
    }

    pub fn session(&self) -> u64 {
        self.tracked.session
    }

    /// State `command` would reach, without committing it
    pub fn check(&self, command: Command) -> Result<PlayerState> {
        transition(self.tracked.state, command)
    }

    /// Apply `command`, leaving state untouched on rejection
    pub fn apply(&mut self, command: Command) -> Result<Transition> {
        let from = self.tracked.state;
        let to = transition(from, command)?;

        if command.starts_session() && from != PlayerState::End {
            self.tracked.session += 1;
        }
        self.tracked.state = to;

        if from != to {
            log::debug!("Player state {} -> {} ({})", from, to, command);
        }

        Ok(Transition {
            from,
            to,
            command,
            session: self.tracked.session,
        })
    }
}

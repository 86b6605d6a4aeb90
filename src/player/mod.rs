//! Player control module for playcore
//!
//! This module owns everything between the application and the engine:
//! the lifecycle state machine, per-player options, the controller that
//! validates and forwards commands, and the reference-counted handles the
//! application holds.

mod controller;
mod handle;
mod lifecycle;
mod options;
mod state;

pub use controller::{MessageLoopFn, PlayerController, UserData};
pub use handle::{MessageReceiver, PlayerBuilder, PlayerHandle, WeakPlayer};
pub use lifecycle::{Lifecycle, RefCount, TeardownPhase};
pub use options::{
    FormatCallback, OverlayFormat, PlayerOptions, DEFAULT_MAX_BUFFER_SIZE, FORMAT_CONTROL_OPEN,
    FRAME_QUEUE_CAPACITY_MAX, FRAME_QUEUE_CAPACITY_MIN,
};
pub use state::{transition, Command, PlayerState, StateGuard, StateMachine, Transition};

//! Notification records for playcore
//!
//! Messages are produced by the engine (and by the controller on its
//! behalf) and consumed by the application's message loop through a
//! [`MessageQueue`]. They are immutable once posted.

mod queue;

pub use queue::{MessageQueue, QueueStats};

use serde::{Deserialize, Serialize};

/// `what` code of [`Message::Flush`]
pub const MSG_FLUSH: i32 = 0;
pub const MSG_ERROR: i32 = 100;
pub const MSG_PREPARED: i32 = 200;
pub const MSG_COMPLETED: i32 = 300;
pub const MSG_VIDEO_SIZE_CHANGED: i32 = 400;
pub const MSG_SAR_CHANGED: i32 = 401;
pub const MSG_BUFFERING_START: i32 = 500;
pub const MSG_BUFFERING_END: i32 = 501;
pub const MSG_BUFFERING_UPDATE: i32 = 502;
pub const MSG_BUFFERING_BYTES_UPDATE: i32 = 503;
pub const MSG_BUFFERING_TIME_UPDATE: i32 = 504;
pub const MSG_SEEK_COMPLETE: i32 = 600;
pub const MSG_IO_STAT: i32 = 700;

/// Asynchronous playback event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// No-op marker
    Flush,

    /// Engine failure; the player is already in `ERROR` when this is read
    Error { code: i32 },

    /// Source opened; the player is already in `PREPARED` when this is read
    Prepared,

    /// End of stream; the player is already in `COMPLETED` when this is read
    PlaybackCompleted,

    VideoSizeChanged { width: i32, height: i32 },

    /// Sample aspect ratio changed
    SarChanged { num: i32, den: i32 },

    BufferingStart,
    BufferingEnd,

    /// Buffer head position and fill percentage
    BufferingUpdate { position_ms: i64, percent: i32 },

    BufferingBytesUpdate { bytes: i64 },

    BufferingTimeUpdate { duration_ms: i64 },

    SeekComplete { position_ms: i64 },

    /// Per-stream transfer statistics
    IoStat {
        read_bytes: i64,
        total_size: i64,
        elapsed_ms: i64,
    },
}

impl Message {
    /// Numeric kind tag
    pub fn what(&self) -> i32 {
        match self {
            Message::Flush => MSG_FLUSH,
            Message::Error { .. } => MSG_ERROR,
            Message::Prepared => MSG_PREPARED,
            Message::PlaybackCompleted => MSG_COMPLETED,
            Message::VideoSizeChanged { .. } => MSG_VIDEO_SIZE_CHANGED,
            Message::SarChanged { .. } => MSG_SAR_CHANGED,
            Message::BufferingStart => MSG_BUFFERING_START,
            Message::BufferingEnd => MSG_BUFFERING_END,
            Message::BufferingUpdate { .. } => MSG_BUFFERING_UPDATE,
            Message::BufferingBytesUpdate { .. } => MSG_BUFFERING_BYTES_UPDATE,
            Message::BufferingTimeUpdate { .. } => MSG_BUFFERING_TIME_UPDATE,
            Message::SeekComplete { .. } => MSG_SEEK_COMPLETE,
            Message::IoStat { .. } => MSG_IO_STAT,
        }
    }

    /// Whether reading this message implies a committed state change
    pub fn is_state_affecting(&self) -> bool {
        matches!(
            self,
            Message::Prepared | Message::PlaybackCompleted | Message::Error { .. }
        )
    }
}

/// Outcome of reading from a [`MessageQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePoll {
    /// Oldest unread message
    Message(Message),
    /// Non-blocking read (or timed read) found nothing
    Empty,
    /// The queue was aborted for shutdown
    Aborted,
}

impl MessagePoll {
    /// `< 0` aborted, `0` empty, `> 0` delivered
    pub fn code(&self) -> i32 {
        match self {
            MessagePoll::Message(_) => 1,
            MessagePoll::Empty => 0,
            MessagePoll::Aborted => -1,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, MessagePoll::Aborted)
    }

    /// The delivered message, if any
    pub fn into_message(self) -> Option<Message> {
        match self {
            MessagePoll::Message(msg) => Some(msg),
            _ => None,
        }
    }
}

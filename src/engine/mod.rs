//! Engine boundary for playcore
//!
//! The engine is the external collaborator that demuxes, decodes,
//! synchronizes and renders. The control core only drives it through the
//! [`Engine`] trait and hears back through an [`EngineSink`]. Any engine
//! that honors this contract plugs in.

mod meta;
mod simulated;

pub use meta::{MediaMeta, StreamKind, StreamMeta};
pub use simulated::{SimulatedEngine, SimulatedEngineFactory, SimulatedProfile, ERROR_UNSUPPORTED};

use crate::message::Message;
use crate::player::{PlayerController, PlayerOptions};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Weak;

/// Latency class of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSourceType {
    LowDelayLive,
    HighDelayLive,
    Vod,
}

impl DataSourceType {
    /// Numeric tag used by the original C API
    pub fn code(self) -> i32 {
        match self {
            DataSourceType::LowDelayLive => 0,
            DataSourceType::HighDelayLive => 1,
            DataSourceType::Vod => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DataSourceType::LowDelayLive),
            1 => Some(DataSourceType::HighDelayLive),
            2 => Some(DataSourceType::Vod),
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        !matches!(self, DataSourceType::Vod)
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSourceType::LowDelayLive => "low-delay live",
            DataSourceType::HighDelayLive => "high-delay live",
            DataSourceType::Vod => "vod",
        })
    }
}

/// What to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub url: String,
    pub source_type: DataSourceType,
}

/// Decode/render engine driven by the control core.
///
/// Every command is fire-and-forget: it must return promptly and report
/// its outcome later through the sink. The exception is [`shutdown`],
/// which blocks until the engine's internal threads have exited; after it
/// returns the engine must not touch its sink again.
///
/// The getters are read by application threads at any time and should
/// return cached values without waiting on I/O.
///
/// [`shutdown`]: Engine::shutdown
pub trait Engine: Send + Sync {
    /// Begin opening `source`; completion is reported as `prepared` or `error`
    ///
    /// # Arguments
    ///
    /// * `source` - URL and source type
    /// * `options` - Option snapshot taken at prepare time
    fn open(&self, source: &DataSource, options: &PlayerOptions) -> Result<()>;

    /// Start or resume output; restart from the beginning after completion
    fn start_playback(&self) -> Result<()>;

    fn pause_playback(&self) -> Result<()>;

    fn stop_playback(&self) -> Result<()>;

    /// Request a seek; a `seek-complete` message follows
    fn seek(&self, position_ms: i64) -> Result<()>;

    /// Stop internal threads and wait for them to exit
    fn shutdown(&self);

    fn current_position(&self) -> i64;

    fn duration(&self) -> i64;

    fn playable_duration(&self) -> i64;

    fn bit_rate(&self) -> i32;

    fn ip_address(&self) -> Option<String>;

    /// Metadata discovered so far
    fn meta(&self) -> Option<MediaMeta>;
}

/// Creates one engine per playback session
pub trait EngineFactory: Send + Sync {
    fn create(&self, sink: EngineSink) -> Result<Box<dyn Engine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(EngineSink) -> Result<Box<dyn Engine>> + Send + Sync,
{
    fn create(&self, sink: EngineSink) -> Result<Box<dyn Engine>> {
        self(sink)
    }
}

/// Engine-to-core callback channel.
///
/// Bound to one player and one engine session. Once the player has moved
/// on (reset, re-prepare, shutdown) or been released, everything sent
/// through an old sink is silently discarded.
#[derive(Clone)]
pub struct EngineSink {
    player: Weak<PlayerController>,
    session: u64,
}

impl EngineSink {
    pub(crate) fn new(player: Weak<PlayerController>, session: u64) -> Self {
        Self { player, session }
    }

    /// Session this sink reports for
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Deliver a message.
    ///
    /// `Prepared`, `PlaybackCompleted` and `Error` drive a state transition
    /// first and are only queued if the transition is legal.
    /// Returns whether the message was accepted.
    pub fn post(&self, msg: Message) -> bool {
        match self.player.upgrade() {
            Some(player) => player.deliver(self.session, msg),
            None => false,
        }
    }

    pub fn prepared(&self) -> bool {
        self.post(Message::Prepared)
    }

    pub fn completed(&self) -> bool {
        self.post(Message::PlaybackCompleted)
    }

    pub fn error(&self, code: i32) -> bool {
        self.post(Message::Error { code })
    }

    /// Whether the player this sink reports to is still reachable
    pub fn is_attached(&self) -> bool {
        self.player.strong_count() > 0
    }

    /// A sink bound to nothing; every post is discarded
    pub fn detached() -> Self {
        Self {
            player: Weak::new(),
            session: 0,
        }
    }
}

impl fmt::Debug for EngineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSink")
            .field("session", &self.session)
            .field("attached", &self.is_attached())
            .finish()
    }
}

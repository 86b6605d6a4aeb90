//! playcore - control plane of a media playback library
//!
//! The crate coordinates an application with an asynchronous decode/render
//! engine: a lifecycle state machine validates every command, a blocking
//! message queue carries engine events back to the application, and
//! reference-counted handles make teardown safe from any thread.
//!
//! ```no_run
//! use std::sync::Arc;
//! use playcore::engine::{DataSourceType, SimulatedEngineFactory, SimulatedProfile};
//! use playcore::message::Message;
//! use playcore::player::PlayerHandle;
//!
//! # fn main() -> playcore::Result<()> {
//! playcore::global::global_init();
//! let factory = Arc::new(SimulatedEngineFactory::new(SimulatedProfile::default()));
//! let player = PlayerHandle::create(factory);
//! player.set_data_source("http://example.com/movie.mp4", DataSourceType::Vod)?;
//! player.prepare_async()?;
//! while let Some(msg) = player.get_message(true).into_message() {
//!     if msg == Message::Prepared {
//!         player.start()?;
//!     }
//!     if msg == Message::PlaybackCompleted {
//!         break;
//!     }
//! }
//! player.dec_ref();
//! playcore::global::global_uninit();
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod global;
pub mod message;
pub mod player;
pub mod utils;

pub use message::{Message, MessagePoll, MessageQueue};
pub use player::{PlayerController, PlayerHandle, PlayerState, WeakPlayer};
pub use utils::error::{PlayerError, Result};

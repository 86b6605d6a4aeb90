//! Reference-counted player handles
//!
//! A [`PlayerHandle`] is one counted reference to a player. Cloning it takes
//! another reference; dropping it gives one back. When the last reference
//! goes, the player is shut down and released exactly once, on whichever
//! thread dropped it.

use crate::engine::EngineFactory;
use crate::message::{Message, MessagePoll, MessageQueue};
use crate::player::controller::{MessageLoopFn, PlayerController};
use crate::player::options::PlayerOptions;

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Player handle builder for customized configuration
pub struct PlayerBuilder {
    factory: Arc<dyn EngineFactory>,
    options: PlayerOptions,
    message_loop: Option<MessageLoopFn>,
}

impl PlayerBuilder {
    /// Create a new builder around an engine factory
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            options: PlayerOptions::default(),
            message_loop: None,
        }
    }

    /// Set the initial engine options
    pub fn with_options(mut self, options: PlayerOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `message_loop` on a dedicated thread, spawned on the first
    /// `prepare_async` and joined by shutdown
    pub fn with_message_loop<F>(mut self, message_loop: F) -> Self
    where
        F: FnOnce(MessageReceiver) + Send + 'static,
    {
        self.message_loop = Some(Box::new(message_loop));
        self
    }

    /// Build the handle; it starts in `IDLE` holding one reference
    pub fn build(self) -> PlayerHandle {
        let inner = PlayerController::new_shared(self.factory, self.options, self.message_loop);
        log::debug!("Player created");
        PlayerHandle { inner }
    }
}

/// Counted reference to a player
pub struct PlayerHandle {
    inner: Arc<PlayerController>,
}

impl PlayerHandle {
    /// Create a player with default options and no message loop thread
    pub fn create(factory: Arc<dyn EngineFactory>) -> Self {
        PlayerBuilder::new(factory).build()
    }

    /// Create a player whose messages are consumed by `message_loop` on a
    /// dedicated thread
    pub fn create_with_message_loop<F>(factory: Arc<dyn EngineFactory>, message_loop: F) -> Self
    where
        F: FnOnce(MessageReceiver) + Send + 'static,
    {
        PlayerBuilder::new(factory).with_message_loop(message_loop).build()
    }

    pub fn builder(factory: Arc<dyn EngineFactory>) -> PlayerBuilder {
        PlayerBuilder::new(factory)
    }

    /// Take another reference
    pub fn inc_ref(&self) -> PlayerHandle {
        self.inner.refs().inc();
        PlayerHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give this reference back; the last one tears the player down
    pub fn dec_ref(self) {
        drop(self);
    }

    pub fn downgrade(&self) -> WeakPlayer {
        WeakPlayer::from_weak(Arc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same player
    pub fn ptr_eq(&self, other: &PlayerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Clone for PlayerHandle {
    fn clone(&self) -> Self {
        self.inc_ref()
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        if self.inner.refs().dec() {
            self.inner.release();
        }
    }
}

impl Deref for PlayerHandle {
    type Target = PlayerController;

    fn deref(&self) -> &PlayerController {
        &self.inner
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Uncounted reference; upgrading succeeds only while a counted one exists
#[derive(Clone)]
pub struct WeakPlayer {
    inner: Weak<PlayerController>,
}

impl WeakPlayer {
    pub(crate) fn from_weak(inner: Weak<PlayerController>) -> Self {
        Self { inner }
    }

    /// Take a counted reference if the player is still live
    pub fn upgrade(&self) -> Option<PlayerHandle> {
        let inner = self.inner.upgrade()?;
        if inner.refs().try_inc() {
            Some(PlayerHandle { inner })
        } else {
            None
        }
    }

    /// Whether the last counted reference is gone
    pub fn is_released(&self) -> bool {
        self.inner.upgrade().map_or(true, |inner| inner.refs().get() == 0)
    }
}

impl fmt::Debug for WeakPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPlayer")
            .field("released", &self.is_released())
            .finish()
    }
}

/// What a message loop thread is given.
///
/// Holds the queue and an uncounted player reference. A loop that upgrades
/// the reference should let the handle go before blocking again, or the
/// player can never reach its final release.
pub struct MessageReceiver {
    queue: Arc<MessageQueue>,
    player: WeakPlayer,
}

impl MessageReceiver {
    pub(crate) fn new(queue: Arc<MessageQueue>, player: WeakPlayer) -> Self {
        Self { queue, player }
    }

    /// Block for the next message; `None` once the queue is aborted
    pub fn recv(&self) -> Option<Message> {
        self.queue.get(true).into_message()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> MessagePoll {
        self.queue.get_timeout(timeout)
    }

    pub fn try_recv(&self) -> MessagePoll {
        self.queue.get(false)
    }

    /// Blocking iterator that ends when the queue is aborted
    pub fn iter(&self) -> impl Iterator<Item = Message> + '_ {
        std::iter::from_fn(move || self.recv())
    }

    pub fn player(&self) -> Option<PlayerHandle> {
        self.player.upgrade()
    }

    pub fn weak_player(&self) -> &WeakPlayer {
        &self.player
    }
}

//! Thread-safe FIFO of player messages
//!
//! Engine threads post, the application's message loop reads. Posting
//! never blocks. Reading may block until a message arrives or the queue is
//! aborted. Abort is one-way: once aborted, posts are dropped and every read
//! returns [`MessagePoll::Aborted`].

use crate::global;
use crate::message::{Message, MessagePoll};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Queue counters for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages accepted by `post`
    pub posted: u64,

    /// Messages handed out by `get`
    pub delivered: u64,

    /// Messages rejected because the queue was aborted
    pub dropped: u64,

    /// Messages discarded by `flush`
    pub flushed: u64,
}

struct Inner {
    messages: VecDeque<Message>,
    aborted: bool,
    stats: QueueStats,
}

/// Message queue owned by one player handle
pub struct MessageQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl MessageQueue {
    /// Create an empty, live queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                messages: VecDeque::new(),
                aborted: false,
                stats: QueueStats::default(),
            }),
            cv: Condvar::new(),
        }
    }

    /// Enqueue at the tail and wake one reader.
    ///
    /// Returns `false` when the message was dropped because the queue has
    /// been aborted. Producers are expected to ignore that: shutdown must
    /// never apply backpressure to engine threads.
    pub fn post(&self, msg: Message) -> bool {
        let mut inner = self.inner.lock();
        if inner.aborted {
            inner.stats.dropped += 1;
            log::trace!("Dropping message {} posted after abort", msg.what());
            return false;
        }

        if global::log_report_enabled() {
            log::info!("Message posted: {:?}", msg);
        } else {
            log::trace!("Message posted: {:?}", msg);
        }

        inner.messages.push_back(msg);
        inner.stats.posted += 1;
        drop(inner);

        self.cv.notify_one();
        true
    }

    /// Read the oldest message.
    ///
    /// With `block` set, waits while the queue is empty and live.
    pub fn get(&self, block: bool) -> MessagePoll {
        let mut inner = self.inner.lock();
        loop {
            if let Some(poll) = Self::take(&mut inner) {
                return poll;
            }
            if !block {
                return MessagePoll::Empty;
            }
            self.cv.wait(&mut inner);
        }
    }

    /// Like a blocking [`get`](Self::get), but gives up after `timeout`.
    ///
    /// A timeout too large to express as a deadline waits without limit.
    pub fn get_timeout(&self, timeout: Duration) -> MessagePoll {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get(true);
        };
        let mut inner = self.inner.lock();
        loop {
            if let Some(poll) = Self::take(&mut inner) {
                return poll;
            }
            if self.cv.wait_until(&mut inner, deadline).timed_out() {
                return Self::take(&mut inner).unwrap_or(MessagePoll::Empty);
            }
        }
    }

    fn take(inner: &mut Inner) -> Option<MessagePoll> {
        if inner.aborted {
            return Some(MessagePoll::Aborted);
        }
        let msg = inner.messages.pop_front()?;
        inner.stats.delivered += 1;
        Some(MessagePoll::Message(msg))
    }

    /// Abort for shutdown and wake every reader. Idempotent.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        if inner.aborted {
            return;
        }
        inner.aborted = true;
        let pending = inner.messages.len() as u64;
        inner.messages.clear();
        inner.stats.flushed += pending;
        drop(inner);

        log::debug!("Message queue aborted ({} pending discarded)", pending);
        self.cv.notify_all();
    }

    /// Discard queued messages; later posts are still accepted
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        let pending = inner.messages.len() as u64;
        inner.messages.clear();
        inner.stats.flushed += pending;
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().aborted
    }

    /// Number of unread messages
    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

//! Player controller for playcore
//!
//! This module provides the [`PlayerController`] that sits between the
//! application and the engine: it validates every command against the state
//! machine, forwards accepted commands to the engine, turns engine callbacks
//! into state transitions and queued messages, and runs the teardown
//! sequence.
//!
//! Lock order is `lifecycle -> command -> state -> (engine | source |
//! options | snapshot)`. Engine callbacks only ever take the state lock, and
//! the engine is never shut down while the state lock is held, so a
//! callback racing a teardown cannot deadlock it.

use crate::engine::{DataSource, DataSourceType, Engine, EngineFactory, EngineSink, MediaMeta};
use crate::internal_error;
use crate::message::{Message, MessagePoll, MessageQueue};
use crate::player::handle::{MessageReceiver, WeakPlayer};
use crate::player::lifecycle::{Lifecycle, RefCount, TeardownPhase};
use crate::player::options::{FormatCallback, OverlayFormat, PlayerOptions};
use crate::player::state::{Command, PlayerState, StateMachine};
use crate::utils::error::{PlayerError, Result};

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Application-defined value attached to a player
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Body of a dedicated message loop thread
pub type MessageLoopFn = Box<dyn FnOnce(MessageReceiver) + Send + 'static>;

/// Last values read from the engine.
///
/// Served when no engine is attached, e.g. after completion teardown or
/// while a reset is in flight.
#[derive(Debug, Clone, Default)]
struct PlaybackSnapshot {
    position: i64,
    duration: i64,
    playable_duration: i64,
    bit_rate: i32,
    ip_address: Option<String>,
    meta: Option<MediaMeta>,
}

enum MessageLoop {
    Idle,
    Pending(MessageLoopFn),
    Running(JoinHandle<()>),
}

/// Control core of one player handle
pub struct PlayerController {
    refs: RefCount,
    lifecycle: Lifecycle,

    /// Serializes commands against each other and against teardown
    command_lock: Mutex<()>,
    machine: StateMachine,
    queue: Arc<MessageQueue>,

    factory: Arc<dyn EngineFactory>,
    engine: Mutex<Option<Arc<dyn Engine>>>,
    source: Mutex<Option<DataSource>>,
    options: Mutex<PlayerOptions>,
    snapshot: Mutex<PlaybackSnapshot>,

    message_loop: Mutex<MessageLoop>,
    user_data: Mutex<Option<UserData>>,

    weak_self: Weak<PlayerController>,
}

impl PlayerController {
    pub(crate) fn new_shared(
        factory: Arc<dyn EngineFactory>,
        options: PlayerOptions,
        message_loop: Option<MessageLoopFn>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            refs: RefCount::new(),
            lifecycle: Lifecycle::new(),
            command_lock: Mutex::new(()),
            machine: StateMachine::new(),
            queue: Arc::new(MessageQueue::new()),
            factory,
            engine: Mutex::new(None),
            source: Mutex::new(None),
            options: Mutex::new(options),
            snapshot: Mutex::new(PlaybackSnapshot::default()),
            message_loop: Mutex::new(match message_loop {
                Some(body) => MessageLoop::Pending(body),
                None => MessageLoop::Idle,
            }),
            user_data: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Record what to play.
    ///
    /// # Arguments
    ///
    /// * `url` - Media location; must not be empty
    /// * `source_type` - Latency class handed to the engine
    pub fn set_data_source(&self, url: &str, source_type: DataSourceType) -> Result<()> {
        let _command = self.command_lock.lock();
        let mut state = self.machine.lock();
        state.check(Command::SetDataSource)?;
        if url.trim().is_empty() {
            return Err(PlayerError::InvalidArgument("data source url is empty".to_string()));
        }
        state.apply(Command::SetDataSource)?;
        *self.source.lock() = Some(DataSource {
            url: url.to_string(),
            source_type,
        });

        info!("Data source set: {} ({})", url, source_type);
        Ok(())
    }

    /// Start opening the data source.
    ///
    /// Returns once the engine has accepted the request; completion arrives
    /// later as a `Prepared` or `Error` message.
    pub fn prepare_async(&self) -> Result<()> {
        let _command = self.command_lock.lock();
        let source = self.source.lock().clone();
        let transition = self.machine.apply(Command::PrepareAsync)?;
        let session = transition.session;

        // Re-preparing from STOPPED retires the previous engine
        let previous = self.engine.lock().take();
        if let Some(previous) = previous {
            debug!("Retiring engine from a previous session");
            previous.shutdown();
        }

        let Some(source) = source else {
            return self.fail_session(session, internal_error!("no data source to prepare"));
        };
        let options = self.options.lock().clone();
        for (category, key, value) in options.entries() {
            debug!("Option {}: {} = {}", category, key, value);
        }

        let sink = EngineSink::new(self.weak_self.clone(), session);
        let engine: Arc<dyn Engine> = match self.factory.create(sink) {
            Ok(engine) => Arc::from(engine),
            Err(e) => return self.fail_session(session, e),
        };
        *self.engine.lock() = Some(Arc::clone(&engine));
        self.start_message_loop();

        info!("Preparing {} (session {})", source.url, session);
        match engine.open(&source, &options) {
            Ok(()) => Ok(()),
            Err(e) => self.fail_session(session, e),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.run_command(Command::Start, |engine| engine.start_playback())
    }

    pub fn pause(&self) -> Result<()> {
        self.run_command(Command::Pause, |engine| engine.pause_playback())
    }

    pub fn stop(&self) -> Result<()> {
        self.run_command(Command::Stop, |engine| engine.stop_playback())
    }

    /// Request a seek; `SeekComplete` follows asynchronously
    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        let _command = self.command_lock.lock();
        self.machine.check(Command::SeekTo)?;
        if position_ms < 0 {
            return Err(PlayerError::InvalidArgument(format!(
                "seek position must not be negative: {}",
                position_ms
            )));
        }
        self.forward_command(Command::SeekTo, |engine| engine.seek(position_ms))
    }

    /// Drop the engine and return to `IDLE`.
    ///
    /// Blocks until the engine's threads have exited; any message still
    /// queued from the old session is flushed.
    pub fn reset(&self) -> Result<()> {
        let _command = self.command_lock.lock();
        self.machine.apply(Command::Reset)?;

        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            engine.shutdown();
        }
        self.queue.flush();
        *self.source.lock() = None;
        *self.snapshot.lock() = PlaybackSnapshot::default();

        info!("Player reset");
        Ok(())
    }

    /// Stop everything and move to `END`. Idempotent.
    ///
    /// After this returns the engine is joined, the queue is aborted and
    /// any message loop thread has exited (unless called from that thread).
    pub fn shutdown(&self) {
        if self.lifecycle.signal(|| self.terminate()) {
            self.join_message_loop();
            self.lifecycle.mark_drained();
            info!("Player shut down");
        }
    }

    fn terminate(&self) {
        let _command = self.command_lock.lock();
        if let Err(e) = self.machine.apply(Command::Release) {
            error!("Release rejected: {}", e);
        }
        self.queue.abort();

        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            self.capture(engine.as_ref());
            engine.shutdown();
        }
    }

    /// Final teardown, run when the last handle is dropped
    pub(crate) fn release(&self) {
        self.shutdown();
        if self.lifecycle.mark_released() {
            info!("Player released");
        }
    }

    fn run_command<F>(&self, command: Command, forward: F) -> Result<()>
    where
        F: FnOnce(&dyn Engine) -> Result<()>,
    {
        let _command = self.command_lock.lock();
        self.forward_command(command, forward)
    }

    /// Commit `command` and pass it on to the engine; caller holds the
    /// command lock
    fn forward_command<F>(&self, command: Command, forward: F) -> Result<()>
    where
        F: FnOnce(&dyn Engine) -> Result<()>,
    {
        let transition = self.machine.apply(command)?;
        debug!("Accepted {} in {}", command, transition.from);

        match self.current_engine() {
            Some(engine) => match forward(engine.as_ref()) {
                Ok(()) => Ok(()),
                Err(e) => self.fail_session(transition.session, e),
            },
            None => Err(internal_error!("no engine attached in {}", transition.to)),
        }
    }

    /// Report a synchronous engine failure the same way an asynchronous one
    /// would arrive, and hand it back to the caller
    fn fail_session(&self, session: u64, err: PlayerError) -> Result<()> {
        warn!("Engine failure: {}", err);
        let code = err.code();
        self.deliver(session, Message::Error { code });
        Err(match err {
            e @ PlayerError::Engine { .. } => e,
            other => PlayerError::Engine {
                code,
                message: other.to_string(),
            },
        })
    }

    // ---------------------------------------------------------------------
    // Engine callbacks
    // ---------------------------------------------------------------------

    /// Entry point for everything an engine reports.
    ///
    /// Messages from a superseded session are discarded. Prepared,
    /// completion and error messages are queued only if their transition is
    /// legal, and only after it has been committed.
    pub(crate) fn deliver(&self, session: u64, msg: Message) -> bool {
        let mut state = self.machine.lock();
        if state.session() != session {
            trace!("Discarding {:?} from stale session {}", msg, session);
            return false;
        }

        let event = match msg {
            Message::Prepared => Some(Command::OnPrepared),
            Message::PlaybackCompleted => Some(Command::OnCompleted),
            Message::Error { .. } => Some(Command::OnError),
            _ => None,
        };
        if let Some(event) = event {
            if let Err(e) = state.apply(event) {
                debug!("Discarding {:?}: {}", msg, e);
                return false;
            }
        }

        self.queue.post(msg)
    }

    // ---------------------------------------------------------------------
    // Getters
    // ---------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.machine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Started
    }

    /// Playback position in milliseconds
    pub fn current_position(&self) -> i64 {
        self.read_cached(|e| e.current_position(), |s| &mut s.position)
    }

    /// Total duration in milliseconds; 0 for live sources
    pub fn duration(&self) -> i64 {
        self.read_cached(|e| e.duration(), |s| &mut s.duration)
    }

    /// Milliseconds buffered ahead of the start
    pub fn playable_duration(&self) -> i64 {
        self.read_cached(|e| e.playable_duration(), |s| &mut s.playable_duration)
    }

    pub fn bit_rate(&self) -> i32 {
        self.read_cached(|e| e.bit_rate(), |s| &mut s.bit_rate)
    }

    pub fn ip_address(&self) -> Option<String> {
        self.read_cached(|e| e.ip_address(), |s| &mut s.ip_address)
    }

    /// Caller-owned copy of the media metadata
    pub fn meta(&self) -> Option<MediaMeta> {
        self.read_cached(|e| e.meta(), |s| &mut s.meta)
    }

    pub fn video_codec_info(&self) -> Option<String> {
        self.meta().and_then(|meta| meta.video_codec_info())
    }

    pub fn audio_codec_info(&self) -> Option<String> {
        self.meta().and_then(|meta| meta.audio_codec_info())
    }

    pub fn data_source(&self) -> Option<DataSource> {
        self.source.lock().clone()
    }

    fn current_engine(&self) -> Option<Arc<dyn Engine>> {
        self.engine.lock().clone()
    }

    fn read_cached<T, R, C>(&self, read: R, cached: C) -> T
    where
        T: Clone,
        R: FnOnce(&dyn Engine) -> T,
        C: FnOnce(&mut PlaybackSnapshot) -> &mut T,
    {
        match self.current_engine() {
            Some(engine) => {
                let value = read(engine.as_ref());
                *cached(&mut self.snapshot.lock()) = value.clone();
                value
            }
            None => cached(&mut self.snapshot.lock()).clone(),
        }
    }

    fn capture(&self, engine: &dyn Engine) {
        let mut snapshot = self.snapshot.lock();
        snapshot.position = engine.current_position();
        snapshot.duration = engine.duration();
        snapshot.playable_duration = engine.playable_duration();
        snapshot.bit_rate = engine.bit_rate();
        snapshot.ip_address = engine.ip_address();
        snapshot.meta = engine.meta();
    }

    // ---------------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------------

    /// Take the next message
    ///
    /// # Arguments
    ///
    /// * `block` - Wait until a message arrives or the queue is aborted
    pub fn get_message(&self, block: bool) -> MessagePoll {
        self.queue.get(block)
    }

    pub fn get_message_timeout(&self, timeout: Duration) -> MessagePoll {
        self.queue.get_timeout(timeout)
    }

    pub fn message_queue(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.queue)
    }

    fn start_message_loop(&self) {
        let mut slot = self.message_loop.lock();
        match std::mem::replace(&mut *slot, MessageLoop::Idle) {
            MessageLoop::Pending(body) => {
                let receiver = MessageReceiver::new(
                    Arc::clone(&self.queue),
                    WeakPlayer::from_weak(self.weak_self.clone()),
                );
                match thread::Builder::new()
                    .name("playcore-msg-loop".to_string())
                    .spawn(move || body(receiver))
                {
                    Ok(handle) => {
                        debug!("Message loop started");
                        *slot = MessageLoop::Running(handle);
                    }
                    Err(e) => error!("Failed to spawn message loop: {}", e),
                }
            }
            other => *slot = other,
        }
    }

    fn join_message_loop(&self) {
        let slot = std::mem::replace(&mut *self.message_loop.lock(), MessageLoop::Idle);
        if let MessageLoop::Running(handle) = slot {
            if handle.thread().id() == thread::current().id() {
                debug!("Shutdown requested from the message loop; not joining it");
                return;
            }
            if handle.join().is_err() {
                error!("{}", internal_error!("message loop thread panicked"));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Options
    // ---------------------------------------------------------------------

    pub fn set_format_option(&self, name: &str, value: &str) {
        debug!("format option {} = {}", name, value);
        self.options.lock().set_format_option(name, value);
    }

    pub fn set_codec_option(&self, name: &str, value: &str) {
        debug!("codec option {} = {}", name, value);
        self.options.lock().set_codec_option(name, value);
    }

    pub fn set_sws_option(&self, name: &str, value: &str) {
        debug!("sws option {} = {}", name, value);
        self.options.lock().set_sws_option(name, value);
    }

    pub fn set_overlay_format(&self, format: OverlayFormat) {
        self.options.lock().overlay_format = format;
    }

    /// Frames of decoded picture queue; clamped to [3, 16]
    pub fn set_picture_queue_capacity(&self, frames: u32) {
        self.options.lock().set_frame_queue_capacity(frames);
    }

    pub fn set_max_fps(&self, max_fps: u32) {
        self.options.lock().max_fps = max_fps;
    }

    pub fn set_framedrop(&self, framedrop: i32) {
        self.options.lock().framedrop = framedrop;
    }

    pub fn set_max_buffer_size(&self, bytes: u32) {
        self.options.lock().max_buffer_size = bytes;
    }

    /// Install the demuxer control hook handed to the engine at the next
    /// `prepare_async`; application state travels in the closure
    pub fn set_format_callback<F>(&self, callback: F)
    where
        F: Fn(i32, &[u8]) -> i32 + Send + Sync + 'static,
    {
        debug!("format callback installed");
        self.options.lock().format_callback = Some(FormatCallback::new(callback));
    }

    /// Options the next `prepare_async` will hand to the engine
    pub fn options(&self) -> PlayerOptions {
        self.options.lock().clone()
    }

    // ---------------------------------------------------------------------
    // Bookkeeping
    // ---------------------------------------------------------------------

    /// Attach an application value, returning the previous one
    pub fn set_user_data(&self, data: UserData) -> Option<UserData> {
        self.user_data.lock().replace(data)
    }

    pub fn user_data(&self) -> Option<UserData> {
        self.user_data.lock().clone()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.get()
    }

    pub fn teardown_phase(&self) -> TeardownPhase {
        self.lifecycle.phase()
    }

    pub(crate) fn refs(&self) -> &RefCount {
        &self.refs
    }
}

impl std::fmt::Debug for PlayerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerController")
            .field("state", &self.state())
            .field("refs", &self.refs.get())
            .field("phase", &self.lifecycle.phase())
            .finish_non_exhaustive()
    }
}

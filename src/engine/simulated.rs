//! Simulated engine
//!
//! A stand-in engine with one worker thread and a virtual clock. It goes
//! through the same motions as a real decoder (asynchronous open,
//! buffering notifications, position updates, end of stream, I/O
//! statistics) without touching any media. The demo binary and the
//! tests drive the control core with it.

use crate::engine::{DataSource, Engine, EngineFactory, EngineSink, MediaMeta, StreamKind, StreamMeta};
use crate::global::{self, IoStatComplete, IO_STAT_READ};
use crate::message::Message;
use crate::player::{PlayerOptions, FORMAT_CONTROL_OPEN};
use crate::utils::error::{IntoPlayerError, PlayerError, Result, CODE_FAILED};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Error code for an unsupported URL scheme
pub const ERROR_UNSUPPORTED: i32 = -1010;

const SUPPORTED_SCHEMES: [&str; 5] = ["http", "https", "file", "rtmp", "rtsp"];

/// How the simulated media behaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedProfile {
    /// Length of VOD sources
    pub duration_ms: i64,

    /// Time between `open` and `prepared`
    pub prepare_delay_ms: u64,

    /// Clock granularity
    pub tick_ms: u64,

    /// Nominal bitrate in bits per second
    pub bitrate: i32,

    pub width: i32,
    pub height: i32,
}

impl Default for SimulatedProfile {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            prepare_delay_ms: 50,
            tick_ms: 10,
            bitrate: 2_000_000,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug)]
enum EngineCommand {
    Open(DataSource),
    Start,
    Pause,
    Stop,
    Seek(i64),
    Shutdown,
}

#[derive(Default)]
struct Shared {
    position: AtomicI64,
    duration: AtomicI64,
    playable: AtomicI64,
    bitrate: AtomicI32,
    ip_address: Mutex<Option<String>>,
    meta: Mutex<Option<MediaMeta>>,
}

/// Engine backed by a virtual clock
pub struct SimulatedEngine {
    cmd_tx: Sender<EngineCommand>,
    shared: Arc<Shared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SimulatedEngine {
    /// Spawn the worker thread
    pub fn spawn(sink: EngineSink, profile: SimulatedProfile) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();
        let shared = Arc::new(Shared::default());

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("playcore-engine-{}", sink.session()))
                .spawn(move || Worker::new(sink, shared, profile).run(cmd_rx))
                .engine_err("Spawning engine thread")?
        };

        Ok(Self {
            cmd_tx,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| PlayerError::engine("engine worker has exited"))
    }
}

impl Engine for SimulatedEngine {
    fn open(&self, source: &DataSource, options: &PlayerOptions) -> Result<()> {
        for (category, key, value) in options.entries() {
            log::debug!("Engine option {}: {}={}", category, key, value);
        }
        if let Some(callback) = &options.format_callback {
            let rc = callback.call(FORMAT_CONTROL_OPEN, source.url.as_bytes());
            if rc != 0 {
                return Err(PlayerError::Engine {
                    code: if rc < 0 { rc } else { CODE_FAILED },
                    message: format!("open of {} vetoed by format callback", source.url),
                });
            }
        }
        self.send(EngineCommand::Open(source.clone()))
    }

    fn start_playback(&self) -> Result<()> {
        self.send(EngineCommand::Start)
    }

    fn pause_playback(&self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    fn stop_playback(&self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    fn seek(&self, position_ms: i64) -> Result<()> {
        self.send(EngineCommand::Seek(position_ms))
    }

    fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("Engine worker panicked");
            }
        }
    }

    fn current_position(&self) -> i64 {
        self.shared.position.load(Ordering::Relaxed)
    }

    fn duration(&self) -> i64 {
        self.shared.duration.load(Ordering::Relaxed)
    }

    fn playable_duration(&self) -> i64 {
        self.shared.playable.load(Ordering::Relaxed)
    }

    fn bit_rate(&self) -> i32 {
        self.shared.bitrate.load(Ordering::Relaxed)
    }

    fn ip_address(&self) -> Option<String> {
        self.shared.ip_address.lock().clone()
    }

    fn meta(&self) -> Option<MediaMeta> {
        self.shared.meta.lock().clone()
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Factory producing [`SimulatedEngine`]s with a fixed profile
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngineFactory {
    profile: SimulatedProfile,
}

impl SimulatedEngineFactory {
    pub fn new(profile: SimulatedProfile) -> Self {
        Self { profile }
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, sink: EngineSink) -> Result<Box<dyn Engine>> {
        Ok(Box::new(SimulatedEngine::spawn(sink, self.profile.clone())?))
    }
}

struct Worker {
    sink: EngineSink,
    shared: Arc<Shared>,
    profile: SimulatedProfile,
    source: Option<DataSource>,
    opening_until: Option<Instant>,
    playing: bool,
    completed: bool,
    last_tick: Instant,
    opened_at: Instant,
    bytes_read: i64,
}

impl Worker {
    fn new(sink: EngineSink, shared: Arc<Shared>, profile: SimulatedProfile) -> Self {
        Self {
            sink,
            shared,
            profile,
            source: None,
            opening_until: None,
            playing: false,
            completed: false,
            last_tick: Instant::now(),
            opened_at: Instant::now(),
            bytes_read: 0,
        }
    }

    fn run(mut self, cmd_rx: Receiver<EngineCommand>) {
        let tick = Duration::from_millis(self.profile.tick_ms.max(1));
        loop {
            match cmd_rx.recv_timeout(tick) {
                Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => self.handle_command(cmd),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.advance();
        }
        log::debug!("Engine worker for session {} exiting", self.sink.session());
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        log::trace!("Engine command: {:?}", cmd);
        match cmd {
            EngineCommand::Open(source) => {
                self.playing = false;
                self.completed = false;
                self.bytes_read = 0;
                self.shared.position.store(0, Ordering::Relaxed);
                self.source = Some(source);
                self.opened_at = Instant::now();
                self.opening_until =
                    Some(Instant::now() + Duration::from_millis(self.profile.prepare_delay_ms));
                self.sink.post(Message::BufferingStart);
            }
            EngineCommand::Start => {
                if self.completed {
                    self.completed = false;
                    self.shared.position.store(0, Ordering::Relaxed);
                }
                self.playing = true;
                self.last_tick = Instant::now();
            }
            EngineCommand::Pause | EngineCommand::Stop => {
                self.playing = false;
            }
            EngineCommand::Seek(target) => {
                let duration = self.shared.duration.load(Ordering::Relaxed);
                let position = if duration > 0 { target.clamp(0, duration) } else { target.max(0) };
                self.shared.position.store(position, Ordering::Relaxed);
                self.last_tick = Instant::now();
                self.sink.post(Message::SeekComplete { position_ms: position });
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn advance(&mut self) {
        if let Some(deadline) = self.opening_until {
            if Instant::now() >= deadline {
                self.opening_until = None;
                self.finish_open();
            }
            return;
        }

        if !self.playing {
            return;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_millis() as i64;
        self.last_tick = now;

        let bytes = self.profile.bitrate as i64 / 8 * elapsed / 1000;
        self.bytes_read += bytes;
        if let Some(source) = &self.source {
            global::report_read(&source.url, IO_STAT_READ, bytes);
        }

        let duration = self.shared.duration.load(Ordering::Relaxed);
        let position = self.shared.position.load(Ordering::Relaxed) + elapsed;
        let is_vod = self.source.as_ref().map_or(true, |s| !s.source_type.is_live());

        if is_vod && position >= duration {
            self.shared.position.store(duration, Ordering::Relaxed);
            self.shared.playable.store(duration, Ordering::Relaxed);
            self.playing = false;
            self.completed = true;
            self.report_complete(duration);
            self.sink.completed();
        } else {
            self.shared.position.store(position, Ordering::Relaxed);
            let playable = if is_vod { (position + 5_000).min(duration) } else { position };
            self.shared.playable.store(playable, Ordering::Relaxed);
        }
    }

    fn finish_open(&mut self) {
        let Some(source) = self.source.clone() else {
            return;
        };

        let scheme = source.url.split("://").next().unwrap_or_default();
        if !source.url.contains("://") || !SUPPORTED_SCHEMES.contains(&scheme) {
            log::warn!("Unsupported source: {}", source.url);
            self.sink.error(ERROR_UNSUPPORTED);
            return;
        }

        let duration = if source.source_type.is_live() { 0 } else { self.profile.duration_ms };
        self.shared.duration.store(duration, Ordering::Relaxed);
        self.shared.bitrate.store(self.profile.bitrate, Ordering::Relaxed);
        *self.shared.ip_address.lock() = match scheme {
            "file" => None,
            _ => Some("127.0.0.1".to_string()),
        };
        *self.shared.meta.lock() = Some(self.build_meta(&source, duration));

        let chunk = self.profile.bitrate as i64 / 8;
        self.bytes_read += chunk;
        global::report_read(&source.url, IO_STAT_READ, chunk);

        self.sink.post(Message::VideoSizeChanged {
            width: self.profile.width,
            height: self.profile.height,
        });
        self.sink.post(Message::BufferingEnd);
        self.sink.prepared();
    }

    fn build_meta(&self, source: &DataSource, duration_ms: i64) -> MediaMeta {
        let format = source
            .url
            .rsplit('.')
            .next()
            .filter(|ext| ext.len() <= 4 && !ext.contains('/'))
            .unwrap_or("mpegts")
            .to_string();

        let mut video = StreamMeta::new(0, StreamKind::Video, "h264");
        video.codec_profile = Some("High".to_string());
        video.width = Some(self.profile.width as u32);
        video.height = Some(self.profile.height as u32);
        video.fps = Some(30.0);
        video.bitrate = Some(self.profile.bitrate as i64 * 7 / 8);

        let mut audio = StreamMeta::new(1, StreamKind::Audio, "aac");
        audio.codec_profile = Some("LC".to_string());
        audio.sample_rate = Some(44_100);
        audio.channel_layout = Some("stereo".to_string());
        audio.bitrate = Some(self.profile.bitrate as i64 / 8);

        MediaMeta {
            format,
            duration_ms,
            start_ms: 0,
            bitrate: self.profile.bitrate as i64,
            streams: vec![video, audio],
            video_stream: Some(0),
            audio_stream: Some(1),
            tags: Default::default(),
        }
    }

    fn report_complete(&self, duration: i64) {
        if let Some(source) = &self.source {
            global::report_complete(&IoStatComplete {
                url: source.url.clone(),
                read_bytes: self.bytes_read,
                total_size: self.bytes_read,
                elapsed_ms: self.opened_at.elapsed().as_millis() as i64,
                total_duration_ms: duration,
            });
            self.sink.post(Message::IoStat {
                read_bytes: self.bytes_read,
                total_size: self.bytes_read,
                elapsed_ms: self.opened_at.elapsed().as_millis() as i64,
            });
        }
    }
}

//! Integration test utilities for playcore
//!
//! This module provides common utilities for integration testing including:
//! - A scripted engine whose callbacks the test fires by hand
//! - Helpers for waiting on asynchronous player state
//! - Temporary configuration files

use anyhow::Result;
use playcore::engine::{DataSource, Engine, EngineFactory, EngineSink, MediaMeta, StreamKind, StreamMeta};
use playcore::message::{Message, MessagePoll};
use playcore::player::{PlayerHandle, PlayerOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Command received by a [`ScriptedEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Open(String),
    Start,
    Pause,
    Stop,
    Seek(i64),
}

/// State shared by every engine a [`Script`] creates
#[derive(Default)]
pub struct Script {
    calls: Mutex<Vec<EngineCall>>,
    sinks: Mutex<Vec<EngineSink>>,
    shutdowns: AtomicUsize,
    open_options: Mutex<Option<PlayerOptions>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Factory producing one [`ScriptedEngine`] per session
    pub fn factory(self: &Arc<Self>) -> Arc<dyn EngineFactory> {
        let script = Arc::clone(self);
        Arc::new(move |sink: EngineSink| -> playcore::Result<Box<dyn Engine>> {
            script.sinks.lock().unwrap().push(sink);
            Ok(Box::new(ScriptedEngine {
                script: Arc::clone(&script),
            }))
        })
    }

    /// Sink of the most recent session
    pub fn sink(&self) -> EngineSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(EngineSink::detached)
    }

    pub fn sessions(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Options handed to the last `open`
    pub fn open_options(&self) -> Option<PlayerOptions> {
        self.open_options.lock().unwrap().clone()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Engine that only records what it is told
pub struct ScriptedEngine {
    script: Arc<Script>,
}

impl Engine for ScriptedEngine {
    fn open(&self, source: &DataSource, options: &PlayerOptions) -> playcore::Result<()> {
        *self.script.open_options.lock().unwrap() = Some(options.clone());
        self.script.record(EngineCall::Open(source.url.clone()));
        Ok(())
    }

    fn start_playback(&self) -> playcore::Result<()> {
        self.script.record(EngineCall::Start);
        Ok(())
    }

    fn pause_playback(&self) -> playcore::Result<()> {
        self.script.record(EngineCall::Pause);
        Ok(())
    }

    fn stop_playback(&self) -> playcore::Result<()> {
        self.script.record(EngineCall::Stop);
        Ok(())
    }

    fn seek(&self, position_ms: i64) -> playcore::Result<()> {
        self.script.record(EngineCall::Seek(position_ms));
        Ok(())
    }

    fn shutdown(&self) {
        self.script.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn current_position(&self) -> i64 {
        0
    }

    fn duration(&self) -> i64 {
        120_000
    }

    fn playable_duration(&self) -> i64 {
        0
    }

    fn bit_rate(&self) -> i32 {
        0
    }

    fn ip_address(&self) -> Option<String> {
        None
    }

    fn meta(&self) -> Option<MediaMeta> {
        Some(sample_meta())
    }
}

/// Metadata with one H.264 video and one AAC audio stream
pub fn sample_meta() -> MediaMeta {
    let mut video = StreamMeta::new(0, StreamKind::Video, "h264");
    video.width = Some(1920);
    video.height = Some(1080);
    MediaMeta {
        format: "mpegts".to_string(),
        duration_ms: 120_000,
        streams: vec![video, StreamMeta::new(1, StreamKind::Audio, "aac")],
        video_stream: Some(0),
        audio_stream: Some(1),
        ..Default::default()
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Read messages until `wanted` arrives; returns everything read, `wanted` last
pub fn read_until(player: &PlayerHandle, wanted: &Message, timeout: Duration) -> Result<Vec<Message>> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match player.get_message_timeout(remaining) {
            MessagePoll::Message(msg) => {
                let done = msg == *wanted;
                seen.push(msg);
                if done {
                    return Ok(seen);
                }
            }
            MessagePoll::Empty => anyhow::bail!("timed out waiting for {:?}; saw {:?}", wanted, seen),
            MessagePoll::Aborted => anyhow::bail!("queue aborted waiting for {:?}", wanted),
        }
    }
}

/// Temporary directory for config files
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Write `contents` to `name` inside the fixture directory
    pub fn write_config(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

//! Per-player configuration passed through to the engine
//!
//! Setters may be called in any state; the engine only sees a snapshot
//! taken at the next `prepare_async`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Smallest accepted frame-queue capacity
pub const FRAME_QUEUE_CAPACITY_MIN: u32 = 3;

/// Largest accepted frame-queue capacity
pub const FRAME_QUEUE_CAPACITY_MAX: u32 = 16;

/// Default demuxer buffer ceiling (15 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: u32 = 15 * 1024 * 1024;

/// Format-control message sent before the demuxer opens a URL; the
/// payload is the URL
pub const FORMAT_CONTROL_OPEN: i32 = 1;

/// Application hook for demuxer control messages.
///
/// Called with a message kind and its payload. A non-zero return vetoes
/// the operation; a negative value is reported as the error code.
#[derive(Clone)]
pub struct FormatCallback(Arc<dyn Fn(i32, &[u8]) -> i32 + Send + Sync>);

impl FormatCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(i32, &[u8]) -> i32 + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn call(&self, kind: i32, data: &[u8]) -> i32 {
        (self.0)(kind, data)
    }
}

impl fmt::Debug for FormatCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormatCallback(..)")
    }
}

impl PartialEq for FormatCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Pixel format of the video overlay, identified by its FourCC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverlayFormat {
    Rv16,
    Rv32,
    Yv12,
    I420,
}

impl OverlayFormat {
    pub fn fourcc(self) -> u32 {
        let tag: &[u8; 4] = match self {
            OverlayFormat::Rv16 => b"RV16",
            OverlayFormat::Rv32 => b"RV32",
            OverlayFormat::Yv12 => b"YV12",
            OverlayFormat::I420 => b"I420",
        };
        u32::from_le_bytes(*tag)
    }

    pub fn from_fourcc(fourcc: u32) -> Option<Self> {
        match &fourcc.to_le_bytes() {
            b"RV16" => Some(OverlayFormat::Rv16),
            b"RV32" => Some(OverlayFormat::Rv32),
            b"YV12" => Some(OverlayFormat::Yv12),
            b"I420" => Some(OverlayFormat::I420),
            _ => None,
        }
    }
}

impl fmt::Display for OverlayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.fourcc().to_le_bytes();
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

/// Options snapshot handed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Demuxer/protocol options
    pub format: BTreeMap<String, String>,

    /// Decoder options
    pub codec: BTreeMap<String, String>,

    /// Scaler options
    pub sws: BTreeMap<String, String>,

    pub overlay_format: OverlayFormat,

    /// Decoded-frame queue size, clamped to [3, 16]
    pub frame_queue_capacity: u32,

    pub max_fps: u32,

    /// Frames the engine may drop when video lags; 0 disables dropping
    pub framedrop: i32,

    /// Demuxer buffer ceiling in bytes
    pub max_buffer_size: u32,

    #[serde(skip)]
    pub format_callback: Option<FormatCallback>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            format: BTreeMap::new(),
            codec: BTreeMap::new(),
            sws: BTreeMap::new(),
            overlay_format: OverlayFormat::Rv32,
            frame_queue_capacity: FRAME_QUEUE_CAPACITY_MIN,
            max_fps: 31,
            framedrop: 0,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            format_callback: None,
        }
    }
}

impl PlayerOptions {
    pub fn set_format_option(&mut self, name: &str, value: &str) {
        self.format.insert(name.to_string(), value.to_string());
    }

    pub fn set_codec_option(&mut self, name: &str, value: &str) {
        self.codec.insert(name.to_string(), value.to_string());
    }

    pub fn set_sws_option(&mut self, name: &str, value: &str) {
        self.sws.insert(name.to_string(), value.to_string());
    }

    pub fn set_frame_queue_capacity(&mut self, frames: u32) {
        self.frame_queue_capacity = frames.clamp(FRAME_QUEUE_CAPACITY_MIN, FRAME_QUEUE_CAPACITY_MAX);
    }

    /// Union `other` over `self`; keys present in both take `other`'s value
    pub fn merged_with(&self, other: &PlayerOptions) -> PlayerOptions {
        let mut merged = other.clone();
        if merged.format_callback.is_none() {
            merged.format_callback = self.format_callback.clone();
        }
        for (target, base) in [
            (&mut merged.format, &self.format),
            (&mut merged.codec, &self.codec),
            (&mut merged.sws, &self.sws),
        ] {
            for (k, v) in base {
                target.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        merged
    }

    /// Every map entry as `(category, key, value)`, for logging
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &String, &String)> {
        self.format
            .iter()
            .map(|(k, v)| ("format", k, v))
            .chain(self.codec.iter().map(|(k, v)| ("codec", k, v)))
            .chain(self.sws.iter().map(|(k, v)| ("sws", k, v)))
    }
}

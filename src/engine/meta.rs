//! Media metadata reported by the engine
//!
//! `get_meta` hands the caller its own deep copy: nothing in a returned
//! [`MediaMeta`] is shared with the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Unknown,
}

/// One elementary stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMeta {
    /// Stream index in the container
    pub index: usize,

    pub kind: StreamKind,

    /// Codec name
    pub codec_name: String,

    /// Codec profile, if known
    pub codec_profile: Option<String>,

    /// Bitrate in bits per second
    pub bitrate: Option<i64>,

    /// Video width
    pub width: Option<u32>,

    /// Video height
    pub height: Option<u32>,

    /// Frame rate (frames per second)
    pub fps: Option<f32>,

    /// Sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Channel layout
    pub channel_layout: Option<String>,

    /// Language tag
    pub language: Option<String>,
}

impl StreamMeta {
    /// Bare stream of `kind` using `codec`
    pub fn new(index: usize, kind: StreamKind, codec: &str) -> Self {
        Self {
            index,
            kind,
            codec_name: codec.to_string(),
            codec_profile: None,
            bitrate: None,
            width: None,
            height: None,
            fps: None,
            sample_rate: None,
            channel_layout: None,
            language: None,
        }
    }

    /// `"codec, profile"` or just `"codec"`
    pub fn codec_info(&self) -> String {
        match &self.codec_profile {
            Some(profile) => format!("{}, {}", self.codec_name, profile),
            None => self.codec_name.clone(),
        }
    }
}

/// Container-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMeta {
    /// Container format
    pub format: String,

    /// Total duration in milliseconds
    pub duration_ms: i64,

    /// Start time in milliseconds
    pub start_ms: i64,

    /// Bitrate in bits per second
    pub bitrate: i64,

    pub streams: Vec<StreamMeta>,

    /// Index into `streams` of the selected video stream
    pub video_stream: Option<usize>,

    /// Index into `streams` of the selected audio stream
    pub audio_stream: Option<usize>,

    /// Container tags
    pub tags: BTreeMap<String, String>,
}

impl MediaMeta {
    pub fn selected_video(&self) -> Option<&StreamMeta> {
        self.video_stream.and_then(|i| self.streams.get(i))
    }

    pub fn selected_audio(&self) -> Option<&StreamMeta> {
        self.audio_stream.and_then(|i| self.streams.get(i))
    }

    pub fn video_codec_info(&self) -> Option<String> {
        self.selected_video().map(StreamMeta::codec_info)
    }

    pub fn audio_codec_info(&self) -> Option<String> {
        self.selected_audio().map(StreamMeta::codec_info)
    }
}

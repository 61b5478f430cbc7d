//! Segment rendering with ffmpeg
//!
//! - **Captions** - cues become an ASS subtitle file burned into the frame
//! - **Segments** - one duration-exact video per script part
//! - **Concatenation** - segments joined into the final artifact
//!
//! Media facts come from a [`MediaProbe`] and every encode goes through an
//! [`FfmpegRunner`], so both can be replaced in tests.

pub mod assembler;
pub mod concat;
pub mod ffmpeg;
pub mod probe;
pub mod subtitle;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use assembler::{SegmentAssembler, SegmentJob};
pub use concat::SegmentConcatenator;
pub use ffmpeg::{EncodeSettings, FfmpegRunner, SystemFfmpeg};
pub use probe::FfprobeProbe;
pub use subtitle::{AssGenerator, AssStyle};

/// Rendering errors the orchestrator branches on
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("audio for segment {index} has zero duration")]
    EmptyAudio { index: usize },

    #[error("segment {index}: no footage and no fallback asset in {}", dir.display())]
    NoFootage { index: usize, dir: PathBuf },

    #[error("fallback lookup failed: {0}")]
    Fallback(String),

    #[error("caption file {}: {message}", path.display())]
    Captions { path: PathBuf, message: String },

    #[error("ffmpeg failed while {stage}: {message}")]
    Ffmpeg { stage: &'static str, message: String },

    #[error("nothing to concatenate")]
    NoSegments,
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where captions sit on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    /// Middle of the frame (short-form and story)
    #[default]
    Center,
    /// Bottom centre, lifted off the edge (long-form)
    LowerThird,
}

impl CaptionPosition {
    /// ASS alignment value (1-9, numpad style)
    #[must_use]
    pub fn to_ass_alignment(&self) -> u8 {
        match self {
            Self::Center => 5,
            Self::LowerThird => 2,
        }
    }

    /// Vertical margin for a frame of the given height
    #[must_use]
    pub fn vertical_margin(&self, frame_height: u32) -> u32 {
        match self {
            Self::Center => 0,
            Self::LowerThird => frame_height / 12,
        }
    }
}

/// Caption placement and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionLayout {
    pub position: CaptionPosition,
    pub font_size: u32,
}

impl CaptionLayout {
    #[must_use]
    pub fn centered(font_size: u32) -> Self {
        Self {
            position: CaptionPosition::Center,
            font_size,
        }
    }

    #[must_use]
    pub fn lower_third(font_size: u32) -> Self {
        Self {
            position: CaptionPosition::LowerThird,
            font_size,
        }
    }
}

/// Facts about a media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: Duration,
    /// `None` for audio-only files
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<f64>,
}

/// Media inspection collaborator
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// Narration audio driving one segment
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: Duration,
}

/// A rendered per-part video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Index of the script part that produced it
    pub index: usize,
    pub path: PathBuf,
    /// Equal to the narration duration of the part
    pub duration: Duration,
}

/// Escape a path for use inside an ffmpeg filter argument
pub(crate) fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Seconds with millisecond precision, as ffmpeg expects them
pub(crate) fn seconds_arg(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

//! Configuration loaded from `~/.config/reelsmith/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::footage::Orientation;
use crate::render::{CaptionLayout, Resolution};
use crate::script::VideoKind;

/// Environment variable holding the Pexels API key.
pub const PEXELS_API_KEY_ENV: &str = "PEXELS_API_KEY";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechSettings,
    pub footage: FootageSettings,
    pub video: VideoSettings,
    pub paths: PathSettings,
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechSettings {
    /// Neural voice short name.
    pub voice: String,
    /// Speaking rate adjustment, e.g. `+10%`.
    pub rate: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice: "en-US-AvaNeural".to_string(),
            rate: "+0%".to_string(),
        }
    }
}

/// Footage search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FootageSettings {
    /// Candidates requested per keyword.
    pub page_size: u32,
    /// Minimum clip count for short videos (none for long videos).
    pub short_min_count: Option<usize>,
}

impl Default for FootageSettings {
    fn default() -> Self {
        Self {
            page_size: 25,
            short_min_count: Some(3),
        }
    }
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoSettings {
    pub short_format: Resolution,
    pub long_format: Resolution,
    /// Caption font file.
    pub font: PathBuf,
    /// Caption size for centered layouts.
    pub font_size: u32,
    /// Caption size for the lower-third layout.
    pub long_font_size: u32,
    pub fps: u32,
    /// x264 preset.
    pub preset: String,
    /// Encoder threads per ffmpeg invocation.
    pub threads: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            short_format: Resolution::new(1080, 1920),
            long_format: Resolution::new(1920, 1080),
            font: PathBuf::from("./fonts/Lobster-Regular.ttf"),
            font_size: 70,
            long_font_size: 50,
            fps: 30,
            preset: "ultrafast".to_string(),
            threads: 4,
        }
    }
}

/// Working directories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    /// Fallback footage used when nothing can be sourced.
    pub background_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Content history (chosen facts/topics/stories).
    pub history_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            background_dir: PathBuf::from("./background"),
            temp_dir: PathBuf::from("./temp"),
            output_dir: PathBuf::from("./output"),
            history_dir: PathBuf::from("./chosen"),
        }
    }
}

/// Everything kind-specific the pipeline needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct KindProfile {
    pub resolution: Resolution,
    pub orientation: Orientation,
    pub layout: CaptionLayout,
    pub min_clip_count: Option<usize>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Render settings for a video kind.
    #[must_use]
    pub fn profile(&self, kind: VideoKind) -> KindProfile {
        match kind {
            VideoKind::Short => KindProfile {
                resolution: self.video.short_format,
                orientation: Orientation::Portrait,
                layout: CaptionLayout::centered(self.video.font_size),
                min_clip_count: self.footage.short_min_count,
            },
            VideoKind::Long => KindProfile {
                resolution: self.video.long_format,
                orientation: Orientation::Landscape,
                layout: CaptionLayout::lower_third(self.video.long_font_size),
                min_clip_count: None,
            },
            VideoKind::Story => KindProfile {
                resolution: self.video.short_format,
                orientation: Orientation::Portrait,
                layout: CaptionLayout::centered(self.video.font_size),
                min_clip_count: None,
            },
        }
    }

    /// Create the temp, output and history directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.paths.temp_dir,
            &self.paths.output_dir,
            &self.paths.history_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelsmith")
        .join("config.toml")
}

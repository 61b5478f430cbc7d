//! ffmpeg process execution

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::VideoSettings;

/// Runs one ffmpeg invocation to completion
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<()>;
}

/// Encoder options shared by segment and final renders
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub audio_codec: String,
    /// x264 preset
    pub preset: String,
    pub threads: u32,
    pub fps: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            threads: 4,
            fps: 30,
        }
    }
}

impl EncodeSettings {
    #[must_use]
    pub fn from_video_settings(video: &VideoSettings) -> Self {
        Self {
            preset: video.preset.clone(),
            threads: video.threads,
            fps: video.fps,
            ..Self::default()
        }
    }

    /// Output-side codec arguments
    #[must_use]
    pub fn codec_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ]
    }
}

/// Leading arguments for every invocation
pub(crate) fn base_args() -> Vec<String> {
    ["-hide_banner", "-loglevel", "warning", "-nostdin"]
        .iter()
        .map(std::string::ToString::to_string)
        .collect()
}

/// Spawns the `ffmpeg` executable
#[derive(Debug, Clone)]
pub struct SystemFfmpeg {
    ffmpeg_path: String,
}

impl Default for SystemFfmpeg {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
        }
    }
}

impl SystemFfmpeg {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl FfmpegRunner for SystemFfmpeg {
    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("ffmpeg args: {:?}", args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.ffmpeg_path))?;

        let mut error_lines = Vec::new();
        let mut last_line = String::new();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                if line.contains("Error") || line.contains("error") {
                    warn!("ffmpeg: {}", line);
                    error_lines.push(line.clone());
                } else {
                    debug!("ffmpeg: {}", line);
                }
                last_line = line;
            }
        }

        let status = child.wait().await.context("failed to wait for ffmpeg")?;
        if !status.success() {
            let message = if error_lines.is_empty() {
                last_line
            } else {
                error_lines.join("\n")
            };
            bail!("ffmpeg exited with status {status}: {}", message.trim());
        }

        Ok(())
    }
}

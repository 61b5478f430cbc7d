//! Media inspection via ffprobe

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{MediaInfo, MediaProbe, Resolution};

/// Runs `ffprobe -print_format json` against a file
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self {
            ffprobe_path: which::which("ffprobe").map_or_else(
                |_| "ffprobe".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
        }
    }
}

impl FfprobeProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.ffprobe_path
    }

    /// Check if ffprobe is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
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
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.ffprobe_path))?;

        if !output.status.success() {
            bail!("ffprobe failed on {}", path.display());
        }

        parse_probe_output(&output.stdout).with_context(|| format!("probing {}", path.display()))
    }
}

/// `FFprobe` JSON output structure
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parse a frame rate such as `30/1` or `30000/1001`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

fn parse_seconds(value: Option<&String>) -> Option<Duration> {
    let secs: f64 = value?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Turn ffprobe's JSON into [`MediaInfo`]
pub fn parse_probe_output(json: &[u8]) -> Result<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json).context("invalid ffprobe JSON")?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_ref()))
        .or_else(|| probe.streams.iter().find_map(|s| parse_seconds(s.duration.as_ref())))
        .ok_or_else(|| anyhow!("no duration reported"))?;

    let resolution = video_stream.and_then(|s| match (s.width, s.height) {
        (Some(w), Some(h)) => Some(Resolution::new(w, h)),
        _ => None,
    });

    Ok(MediaInfo {
        duration,
        resolution,
        frame_rate: video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
    })
}

//! Final concatenation of rendered segments

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::ffmpeg::{base_args, EncodeSettings, FfmpegRunner};
use super::{RenderError, Segment};

/// Joins segments, in the order given, into one re-encoded file
pub struct SegmentConcatenator {
    runner: Arc<dyn FfmpegRunner>,
    encode: EncodeSettings,
}

impl SegmentConcatenator {
    #[must_use]
    pub fn new(runner: Arc<dyn FfmpegRunner>, encode: EncodeSettings) -> Self {
        Self { runner, encode }
    }

    /// Concatenate `segments` into `output`, returning the indices of the
    /// segments that made it into the file.
    ///
    /// Segments whose file has disappeared are dropped with a warning. A
    /// failed render removes whatever was written to `output`.
    pub async fn concatenate(
        &self,
        segments: &[Segment],
        output: &Path,
    ) -> Result<Vec<usize>, RenderError> {
        let mut inputs = Vec::with_capacity(segments.len());
        for segment in segments {
            match tokio::fs::metadata(&segment.path).await {
                Ok(meta) if meta.is_file() => inputs.push(segment),
                Ok(_) => warn!("Segment {} is not a file, skipping", segment.path.display()),
                Err(e) => warn!("Segment {} unavailable: {e}", segment.path.display()),
            }
        }
        if inputs.is_empty() {
            return Err(RenderError::NoSegments);
        }

        let args = build_concat_args(&inputs, &self.encode, output);
        info!("Concatenating {} segments into {}", inputs.len(), output.display());

        if let Err(e) = self.runner.run(&args).await {
            match tokio::fs::remove_file(output).await {
                Ok(()) => info!("Removed partial output {}", output.display()),
                Err(io) if io.kind() == std::io::ErrorKind::NotFound => {}
                Err(io) => warn!("Could not remove partial output {}: {io}", output.display()),
            }
            return Err(RenderError::Ffmpeg {
                stage: "concatenating segments",
                message: format!("{e:#}"),
            });
        }

        Ok(inputs.iter().map(|segment| segment.index).collect())
    }
}

fn build_concat_args(segments: &[&Segment], encode: &EncodeSettings, output: &Path) -> Vec<String> {
    let mut args = base_args();
    let mut pads = String::new();
    for (i, segment) in segments.iter().enumerate() {
        args.push("-i".to_string());
        args.push(segment.path.to_string_lossy().to_string());
        pads.push_str(&format!("[{i}:v][{i}:a]"));
    }

    args.push("-filter_complex".to_string());
    args.push(format!(
        "{pads}concat=n={}:v=1:a=1[vout][aout]",
        segments.len()
    ));
    args.extend(["-map", "[vout]", "-map", "[aout]"].iter().map(|s| (*s).to_string()));
    args.extend(encode.codec_args());
    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());
    args
}

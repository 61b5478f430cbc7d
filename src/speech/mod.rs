//! Speech synthesis and narration capture
//!
//! A [`SpeechSynthesizer`] streams audio bytes interleaved with word boundary
//! events. [`narrate`] drains that stream completely, appending audio to a
//! file in arrival order and turning boundaries into caption cues, then
//! probes the file for the narration duration that drives the segment.

pub mod edge;
mod socket;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::render::{AudioTrack, MediaProbe};
use crate::timeline::{BoundaryEvent, Cue, TimelineBuilder};

pub use edge::EdgeTts;

/// One item of a synthesis stream
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechChunk {
    Audio(Bytes),
    Boundary(BoundaryEvent),
}

pub type SpeechStream = BoxStream<'static, Result<SpeechChunk>>;

/// Text-to-speech collaborator
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechStream>;
}

/// Narration audio on disk plus its caption cues
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub audio: AudioTrack,
    pub cues: Vec<Cue>,
}

/// Synthesize `text` into `audio_path` and collect its cues.
///
/// The stream is drained before returning. An existing file at `audio_path`
/// is replaced.
pub async fn narrate(
    synthesizer: &dyn SpeechSynthesizer,
    probe: &dyn MediaProbe,
    text: &str,
    audio_path: &Path,
) -> Result<Narration> {
    let mut stream = synthesizer.synthesize(text).await?;

    let mut file = File::create(audio_path)
        .await
        .with_context(|| format!("failed to create {}", audio_path.display()))?;
    let mut timeline = TimelineBuilder::new();
    let mut audio_bytes = 0usize;

    while let Some(chunk) = stream.next().await {
        match chunk? {
            SpeechChunk::Audio(data) => {
                file.write_all(&data).await?;
                audio_bytes += data.len();
            }
            SpeechChunk::Boundary(event) => {
                let cue = timeline.push(event);
                debug!("cue {:?} {:?}..{:?}", cue.text, cue.start, cue.end);
            }
        }
    }
    file.flush().await?;
    drop(file);

    if audio_bytes == 0 {
        bail!("speech service returned no audio");
    }

    let info = probe
        .probe(audio_path)
        .await
        .with_context(|| format!("failed to probe narration {}", audio_path.display()))?;
    let cues = timeline.finish();

    info!(
        "Narration {}: {:.2}s, {} cues, {} bytes",
        audio_path.display(),
        info.duration.as_secs_f64(),
        cues.len(),
        audio_bytes
    );

    Ok(Narration {
        audio: AudioTrack {
            path: PathBuf::from(audio_path),
            duration: info.duration,
        },
        cues,
    })
}

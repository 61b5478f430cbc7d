//! Per-part segment composition
//!
//! One ffmpeg invocation per segment. The narration is input 0; every clip
//! is an input trimmed (or looped, when shorter) to an equal share of the
//! narration. Clips are scaled and letterboxed to the target frame, joined,
//! padded by cloning the last frame and cut to the narration length before
//! captions are burned in.
//!
//! ```text
//! [1:v] scale,pad,fps,trim ─┐
//! [2:v] scale,pad,fps,trim ─┼─ concat ─ tpad ─ trim(A) ─ ass ─► [vout]
//! [n:v] scale,pad,fps,trim ─┘
//! [0:a] ─────────────────────────────────────────────────────► audio
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::ffmpeg::{base_args, EncodeSettings, FfmpegRunner};
use super::subtitle::{font_family, AssGenerator, AssStyle};
use super::{
    escape_filter_path, seconds_arg, AudioTrack, CaptionLayout, MediaProbe, RenderError,
    Resolution, Segment,
};
use crate::config::Config;
use crate::footage::{ClipAsset, FallbackAssetStore};
use crate::pipeline::ResourceTracker;
use crate::timeline::Cue;

/// Inputs for one segment
#[derive(Debug, Clone, Copy)]
pub struct SegmentJob<'a> {
    pub index: usize,
    pub audio: &'a AudioTrack,
    pub cues: &'a [Cue],
    pub clips: &'a [ClipAsset],
    pub output: &'a Path,
}

/// Settings that stay fixed for a whole run
#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    pub encode: EncodeSettings,
    /// Caption font file
    pub font: PathBuf,
    /// Where fallback footage is picked from
    pub background_dir: PathBuf,
}

impl AssemblerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            encode: EncodeSettings::from_video_settings(&config.video),
            font: config.video.font.clone(),
            background_dir: config.paths.background_dir.clone(),
        }
    }
}

/// A visual input after fallback resolution
#[derive(Debug, Clone, PartialEq)]
struct VisualSource {
    path: PathBuf,
    /// `None` when unknown; such sources are always looped
    duration: Option<Duration>,
}

/// Caption file plus the directory its font lives in
#[derive(Debug, Clone, Copy)]
struct CaptionFile<'a> {
    path: &'a Path,
    fonts_dir: Option<&'a Path>,
}

pub struct SegmentAssembler {
    runner: Arc<dyn FfmpegRunner>,
    probe: Arc<dyn MediaProbe>,
    fallback: Arc<dyn FallbackAssetStore>,
    settings: AssemblerSettings,
}

impl SegmentAssembler {
    #[must_use]
    pub fn new(
        runner: Arc<dyn FfmpegRunner>,
        probe: Arc<dyn MediaProbe>,
        fallback: Arc<dyn FallbackAssetStore>,
        settings: AssemblerSettings,
    ) -> Self {
        Self {
            runner,
            probe,
            fallback,
            settings,
        }
    }

    /// Render one segment whose duration equals the narration duration.
    ///
    /// An empty clip list is replaced by one random fallback asset. The
    /// caption file is registered with `batch`; the segment file itself is
    /// left for the caller to track.
    pub async fn assemble(
        &self,
        job: &SegmentJob<'_>,
        layout: &CaptionLayout,
        resolution: Resolution,
        batch: &mut ResourceTracker,
    ) -> Result<Segment, RenderError> {
        let audio_duration = job.audio.duration;
        if audio_duration.is_zero() {
            return Err(RenderError::EmptyAudio { index: job.index });
        }

        let sources = if job.clips.is_empty() {
            vec![self.fallback_source(job.index).await?]
        } else {
            job.clips
                .iter()
                .map(|clip| VisualSource {
                    path: clip.local_path.clone(),
                    duration: Some(clip.duration),
                })
                .collect()
        };

        let caption_path = job.output.with_extension("ass");
        batch.track_temp(&caption_path);
        let style = AssStyle::caption(&font_family(&self.settings.font), layout, resolution);
        AssGenerator::new(resolution, style)
            .write_to_file(job.cues, &caption_path)
            .await
            .map_err(|e| RenderError::Captions {
                path: caption_path.clone(),
                message: format!("{e:#}"),
            })?;

        let captions = CaptionFile {
            path: &caption_path,
            fonts_dir: self.settings.font.parent().filter(|p| !p.as_os_str().is_empty()),
        };
        let args = build_segment_args(
            job.audio,
            &sources,
            captions,
            resolution,
            &self.settings.encode,
            job.output,
        );

        info!(
            "Rendering segment {} ({} sources, {:.2}s)",
            job.index,
            sources.len(),
            audio_duration.as_secs_f64()
        );
        self.runner
            .run(&args)
            .await
            .map_err(|e| RenderError::Ffmpeg {
                stage: "rendering segment",
                message: format!("{e:#}"),
            })?;

        self.check_duration(job, audio_duration).await;

        Ok(Segment {
            index: job.index,
            path: job.output.to_path_buf(),
            duration: audio_duration,
        })
    }

    async fn fallback_source(&self, index: usize) -> Result<VisualSource, RenderError> {
        let dir = &self.settings.background_dir;
        let picked = self
            .fallback
            .pick_random(dir)
            .await
            .map_err(|e| RenderError::Fallback(format!("{e:#}")))?;

        let Some(path) = picked else {
            return Err(RenderError::NoFootage {
                index,
                dir: dir.clone(),
            });
        };

        warn!("No footage for part {index}, using fallback {}", path.display());
        let duration = match self.probe.probe(&path).await {
            Ok(info) => Some(info.duration),
            Err(e) => {
                debug!("Could not probe fallback {}: {e:#}", path.display());
                None
            }
        };
        Ok(VisualSource { path, duration })
    }

    async fn check_duration(&self, job: &SegmentJob<'_>, expected: Duration) {
        let frame = Duration::from_secs_f64(1.0 / f64::from(self.settings.encode.fps.max(1)));
        match self.probe.probe(job.output).await {
            Ok(info) => {
                let drift = if info.duration > expected {
                    info.duration - expected
                } else {
                    expected - info.duration
                };
                if drift > frame {
                    warn!(
                        "Segment {} is {:.3}s, narration is {:.3}s",
                        job.index,
                        info.duration.as_secs_f64(),
                        expected.as_secs_f64()
                    );
                }
            }
            Err(e) => warn!("Could not probe segment {}: {e:#}", job.index),
        }
    }
}

fn build_segment_args(
    audio: &AudioTrack,
    sources: &[VisualSource],
    captions: CaptionFile<'_>,
    resolution: Resolution,
    encode: &EncodeSettings,
    output: &Path,
) -> Vec<String> {
    let count = u32::try_from(sources.len().max(1)).unwrap_or(u32::MAX);
    let share = audio.duration / count;
    let share_arg = seconds_arg(share);
    let total_arg = seconds_arg(audio.duration);

    let mut args = base_args();
    args.push("-i".to_string());
    args.push(audio.path.to_string_lossy().to_string());

    for source in sources {
        if source.duration.map_or(true, |d| d < share) {
            args.push("-stream_loop".to_string());
            args.push("-1".to_string());
        }
        args.push("-t".to_string());
        args.push(share_arg.clone());
        args.push("-i".to_string());
        args.push(source.path.to_string_lossy().to_string());
    }

    let (w, h) = (resolution.width, resolution.height);
    let mut filters = Vec::with_capacity(sources.len() + 2);
    let mut labels = String::new();
    for i in 0..sources.len() {
        filters.push(format!(
            "[{input}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},\
             trim=duration={share_arg},setpts=PTS-STARTPTS[v{i}]",
            input = i + 1,
            fps = encode.fps,
        ));
        labels.push_str(&format!("[v{i}]"));
    }
    filters.push(format!("{labels}concat=n={}:v=1:a=0[vcat]", sources.len()));

    let mut tail = format!(
        "[vcat]tpad=stop_mode=clone:stop_duration={total_arg},\
         trim=duration={total_arg},setpts=PTS-STARTPTS"
    );
    tail.push_str(&format!(",ass='{}'", escape_filter_path(captions.path)));
    if let Some(dir) = captions.fonts_dir {
        tail.push_str(&format!(":fontsdir='{}'", escape_filter_path(dir)));
    }
    tail.push_str("[vout]");
    filters.push(tail);

    args.push("-filter_complex".to_string());
    args.push(filters.join(";"));
    args.extend(["-map", "[vout]", "-map", "0:a"].iter().map(|s| (*s).to_string()));
    args.extend(encode.codec_args());
    args.push("-t".to_string());
    args.push(total_arg);
    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MediaInfo;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn audio(secs: f64) -> AudioTrack {
        AudioTrack {
            path: PathBuf::from("/tmp/part-0.mp3"),
            duration: Duration::from_secs_f64(secs),
        }
    }

    fn source(path: &str, secs: Option<u64>) -> VisualSource {
        VisualSource {
            path: PathBuf::from(path),
            duration: secs.map(Duration::from_secs),
        }
    }

    fn filter_of(args: &[String]) -> &str {
        let idx = args.iter().position(|a| a == "-filter_complex").unwrap();
        &args[idx + 1]
    }

    /// Arguments immediately preceding `-i <path>`
    fn input_options<'a>(args: &'a [String], path: &str) -> &'a [String] {
        let idx = args.iter().position(|a| a == path).unwrap();
        let start = args[..idx - 1]
            .iter()
            .rposition(|a| a == "-i")
            .map_or(0, |p| p + 2);
        &args[start..idx - 1]
    }

    #[test]
    fn test_short_clip_loops_and_long_clip_trims() {
        let captions = CaptionFile {
            path: Path::new("/tmp/segment_0.ass"),
            fonts_dir: Some(Path::new("./fonts")),
        };
        let args = build_segment_args(
            &audio(4.0),
            &[source("/tmp/a.mp4", Some(1)), source("/tmp/b.mp4", Some(10))],
            captions,
            Resolution::new(1080, 1920),
            &EncodeSettings::default(),
            Path::new("/tmp/segment_0.mp4"),
        );

        let a_opts = input_options(&args, "/tmp/a.mp4");
        assert!(a_opts.contains(&"-stream_loop".to_string()));
        assert!(a_opts.contains(&"2.000".to_string()));
        let b_opts = input_options(&args, "/tmp/b.mp4");
        assert!(!b_opts.contains(&"-stream_loop".to_string()));
        assert!(b_opts.contains(&"2.000".to_string()));

        let filter = filter_of(&args);
        assert!(filter.contains("[1:v]scale=1080:1920:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2"));
        assert!(filter.contains("trim=duration=2.000"));
        assert!(filter.contains("[v0][v1]concat=n=2:v=1:a=0[vcat]"));
        assert!(filter.contains("tpad=stop_mode=clone:stop_duration=4.000,trim=duration=4.000"));
        assert!(filter.contains("ass='/tmp/segment_0.ass':fontsdir='./fonts'[vout]"));

        let t = args.iter().rposition(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "4.000");
        assert_eq!(args.last().unwrap(), "/tmp/segment_0.mp4");
        assert!(args.contains(&"0:a".to_string()));
    }

    #[test]
    fn test_unknown_duration_always_loops() {
        let captions = CaptionFile {
            path: Path::new("/tmp/s.ass"),
            fonts_dir: None,
        };
        let args = build_segment_args(
            &audio(3.0),
            &[source("/tmp/bg.mp4", None)],
            captions,
            Resolution::new(1920, 1080),
            &EncodeSettings::default(),
            Path::new("/tmp/s.mp4"),
        );
        let opts = input_options(&args, "/tmp/bg.mp4");
        assert_eq!(opts, ["-stream_loop", "-1", "-t", "3.000"]);
        assert!(filter_of(&args).contains("concat=n=1:v=1:a=0"));
        assert!(!filter_of(&args).contains("fontsdir"));
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl FfmpegRunner for RecordingRunner {
        async fn run(&self, args: &[String]) -> Result<()> {
            self.calls.lock().unwrap().push(args.to_vec());
            if self.fail {
                return Err(anyhow!("Invalid data found when processing input"));
            }
            let output = args.last().ok_or_else(|| anyhow!("no output"))?;
            tokio::fs::write(output, b"video").await?;
            Ok(())
        }
    }

    struct FixedProbe(Duration);

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
            Ok(MediaInfo {
                duration: self.0,
                resolution: Some(Resolution::new(1080, 1920)),
                frame_rate: Some(30.0),
            })
        }
    }

    struct FixedFallback(Option<PathBuf>);

    #[async_trait]
    impl FallbackAssetStore for FixedFallback {
        async fn pick_random(&self, _directory: &Path) -> Result<Option<PathBuf>> {
            Ok(self.0.clone())
        }
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("reelsmith_assembler_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn assembler(
        runner: Arc<RecordingRunner>,
        fallback: Option<PathBuf>,
    ) -> SegmentAssembler {
        SegmentAssembler::new(
            runner,
            Arc::new(FixedProbe(Duration::from_secs(5))),
            Arc::new(FixedFallback(fallback)),
            AssemblerSettings {
                encode: EncodeSettings::default(),
                font: PathBuf::from("./fonts/Lobster-Regular.ttf"),
                background_dir: PathBuf::from("./background"),
            },
        )
    }

    #[tokio::test]
    async fn test_empty_clip_list_uses_fallback() {
        let dir = scratch_dir();
        let runner = Arc::new(RecordingRunner::default());
        let assembler = assembler(runner.clone(), Some(PathBuf::from("/bg/waves.mp4")));
        let track = audio(5.0);
        let output = dir.join("segment_0.mp4");
        let cues = vec![Cue {
            start: Duration::ZERO,
            end: Duration::from_millis(500),
            text: "Hi".to_string(),
        }];
        let job = SegmentJob {
            index: 0,
            audio: &track,
            cues: &cues,
            clips: &[],
            output: &output,
        };
        let mut batch = ResourceTracker::new("segment test");

        let segment = assembler
            .assemble(&job, &CaptionLayout::centered(70), Resolution::new(1080, 1920), &mut batch)
            .await
            .unwrap();

        assert_eq!(segment.duration, Duration::from_secs(5));
        assert_eq!(segment.path, output);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"/bg/waves.mp4".to_string()));
        assert_eq!(batch.temp_files(), [dir.join("segment_0.ass")]);
        drop(calls);

        batch.release_all();
        assert!(!dir.join("segment_0.ass").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_no_footage_and_no_fallback_fails_before_encoding() {
        let runner = Arc::new(RecordingRunner::default());
        let assembler = assembler(runner.clone(), None);
        let track = audio(2.0);
        let job = SegmentJob {
            index: 3,
            audio: &track,
            cues: &[],
            clips: &[],
            output: Path::new("/tmp/never.mp4"),
        };
        let mut batch = ResourceTracker::new("segment test");

        let err = assembler
            .assemble(&job, &CaptionLayout::centered(70), Resolution::new(1080, 1920), &mut batch)
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::NoFootage { index: 3, .. }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_encoder_failure_is_reported() {
        let dir = scratch_dir();
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..RecordingRunner::default()
        });
        let assembler = assembler(runner, None);
        let track = audio(2.0);
        let clips = vec![ClipAsset {
            source_uri: "https://x/1".to_string(),
            local_path: dir.join("clip.mp4"),
            duration: Duration::from_secs(3),
            resolution: None,
        }];
        let output = dir.join("long_segment_1.mp4");
        let job = SegmentJob {
            index: 1,
            audio: &track,
            cues: &[],
            clips: &clips,
            output: &output,
        };
        let mut batch = ResourceTracker::new("segment test");

        let err = assembler
            .assemble(&job, &CaptionLayout::lower_third(50), Resolution::new(1920, 1080), &mut batch)
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Ffmpeg { .. }));
        assert!(err.to_string().contains("Invalid data"));
        batch.release_all();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_zero_length_audio_is_rejected() {
        let assembler = assembler(Arc::new(RecordingRunner::default()), None);
        let track = audio(0.0);
        let job = SegmentJob {
            index: 0,
            audio: &track,
            cues: &[],
            clips: &[],
            output: Path::new("/tmp/x.mp4"),
        };
        let mut batch = ResourceTracker::new("segment test");
        let err = assembler
            .assemble(&job, &CaptionLayout::centered(70), Resolution::new(1080, 1920), &mut batch)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyAudio { index: 0 }));
    }
}

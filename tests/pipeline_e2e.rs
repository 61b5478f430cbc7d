//! End-to-end pipeline runs against in-process collaborators.
//!
//! Media files are tiny JSON documents (`{"duration": 4.0}`); the fake probe
//! reads them and the fake ffmpeg writes them, so durations flow through the
//! whole run exactly as they would with real encodes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use reelsmith::footage::{
    DirectoryFallback, FootageCandidate, FootageFetcher, FootageProvider, Orientation,
};
use reelsmith::pipeline::{
    Collaborators, ContentHistory, FailureReason, JsonContentHistory, PipelineOrchestrator,
    RunState,
};
use reelsmith::render::{FfmpegRunner, MediaInfo, MediaProbe};
use reelsmith::speech::{SpeechChunk, SpeechStream, SpeechSynthesizer};
use reelsmith::timeline::TICKS_PER_SECOND;
use reelsmith::{BoundaryEvent, Config, ScriptPlan, VideoKind};

// ─── Fakes ───────────────────────────────────────────────────────────────────

fn media_json(secs: f64) -> String {
    format!("{{\"duration\":{secs}}}")
}

fn read_duration(path: &Path) -> Result<f64> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    value["duration"]
        .as_f64()
        .ok_or_else(|| anyhow!("{} has no duration", path.display()))
}

/// Narrates each known text as a media document of a fixed length
struct FakeSpeech {
    durations: HashMap<String, f64>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<SpeechStream> {
        let Some(&secs) = self.durations.get(text) else {
            bail!("speech service rejected {text:?}");
        };

        let body = media_json(secs);
        let (head, tail) = body.split_at(body.len() / 2);
        let words: Vec<&str> = text.split_whitespace().collect();
        let total_ticks = (secs * TICKS_PER_SECOND as f64) as u64;
        let step = total_ticks / words.len().max(1) as u64;

        let mut chunks: Vec<Result<SpeechChunk>> =
            vec![Ok(SpeechChunk::Audio(Bytes::from(head.to_string())))];
        for (i, word) in words.iter().enumerate() {
            chunks.push(Ok(SpeechChunk::Boundary(BoundaryEvent::new(
                i as u64 * step,
                step,
                *word,
            ))));
        }
        chunks.push(Ok(SpeechChunk::Audio(Bytes::from(tail.to_string()))));
        Ok(futures::stream::iter(chunks).boxed())
    }
}

struct JsonProbe;

#[async_trait]
impl MediaProbe for JsonProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        Ok(MediaInfo {
            duration: Duration::from_secs_f64(read_duration(path)?),
            resolution: None,
            frame_rate: None,
        })
    }
}

/// `per_keyword` candidates of `secs` seconds for every keyword
struct StockProvider {
    per_keyword: usize,
    secs: u64,
}

#[async_trait]
impl FootageProvider for StockProvider {
    async fn search(
        &self,
        keyword: &str,
        _orientation: Orientation,
        _page_size: u32,
    ) -> Result<Vec<FootageCandidate>> {
        Ok((0..self.per_keyword)
            .map(|i| FootageCandidate {
                download_url: format!("https://stock.test/{keyword}/{i}.mp4?secs={}", self.secs),
                duration: Some(Duration::from_secs(self.secs)),
                resolution: None,
            })
            .collect())
    }
}

struct StockFetcher {
    fail: bool,
}

#[async_trait]
impl FootageFetcher for StockFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        if self.fail {
            bail!("connection reset fetching {url}");
        }
        let secs = url
            .rsplit_once("secs=")
            .and_then(|(_, secs)| secs.parse::<f64>().ok())
            .unwrap_or(2.0);
        std::fs::write(dest, media_json(secs))?;
        Ok(dest.to_path_buf())
    }
}

/// Writes a media document at the output path of every invocation
#[derive(Default)]
struct FakeFfmpeg {
    fail_segments: bool,
    /// Write a partial output, then fail the final render
    fail_concat: bool,
    /// Report success without writing outputs ending in this name
    lose_output: Option<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeFfmpeg {
    /// (segment renders, concatenations) seen so far
    fn call_counts(&self) -> (usize, usize) {
        let calls = self.calls.lock().unwrap();
        let segments = calls.iter().filter(|args| is_segment_render(args)).count();
        (segments, calls.len() - segments)
    }

    fn segment_calls(&self) -> usize {
        self.call_counts().0
    }

    fn concat_calls(&self) -> usize {
        self.call_counts().1
    }

    /// Input count of every segment render, in call order
    fn segment_input_counts(&self) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|args| is_segment_render(args))
            .map(|args| args.iter().filter(|a| *a == "-i").count())
            .collect()
    }
}

fn is_segment_render(args: &[String]) -> bool {
    args.iter().any(|a| a.contains("[vcat]"))
}

#[async_trait]
impl FfmpegRunner for FakeFfmpeg {
    async fn run(&self, args: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(args.to_vec());

        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, path)| path)
            .collect();
        for input in &inputs {
            if !Path::new(input.as_str()).exists() {
                bail!("{input}: No such file or directory");
            }
        }
        if self.fail_segments && is_segment_render(args) {
            bail!("Error initializing complex filters");
        }

        let n = args.len();
        let output = args.last().ok_or_else(|| anyhow!("no output"))?;
        if self.fail_concat && !is_segment_render(args) {
            std::fs::write(output, "truncated")?;
            bail!("Conversion failed!");
        }
        if self.lose_output.as_deref().is_some_and(|name| output.ends_with(name)) {
            return Ok(());
        }
        let duration = if n >= 4 && args[n - 4] == "-t" {
            args[n - 3].parse::<f64>()?
        } else {
            let mut total = 0.0;
            for input in &inputs {
                total += read_duration(Path::new(input.as_str()))?;
            }
            total
        };
        std::fs::write(output, media_json(duration))?;
        Ok(())
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Workspace {
    root: PathBuf,
    config: Config,
    provider: Arc<StockProvider>,
}

impl Workspace {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("reelsmith_e2e_{}", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.paths.temp_dir = root.join("temp");
        config.paths.output_dir = root.join("output");
        config.paths.history_dir = root.join("chosen");
        config.paths.background_dir = root.join("background");
        Self {
            root,
            config,
            provider: Arc::new(StockProvider {
                per_keyword: 4,
                secs: 2,
            }),
        }
    }

    fn with_provider(mut self, per_keyword: usize, secs: u64) -> Self {
        self.provider = Arc::new(StockProvider { per_keyword, secs });
        self
    }

    fn with_background(self) -> Self {
        std::fs::create_dir_all(&self.config.paths.background_dir).unwrap();
        std::fs::write(
            self.config.paths.background_dir.join("beach.mp4"),
            media_json(10.0),
        )
        .unwrap();
        self
    }

    fn temp_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.paths.temp_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn collaborators(
        &self,
        speech: FakeSpeech,
        fetch_fails: bool,
        ffmpeg: Arc<FakeFfmpeg>,
    ) -> Collaborators {
        Collaborators {
            speech: Arc::new(speech),
            provider: self.provider.clone(),
            fetcher: Arc::new(StockFetcher { fail: fetch_fails }),
            probe: Arc::new(JsonProbe),
            ffmpeg,
            fallback: Arc::new(DirectoryFallback),
            history: Some(Arc::new(JsonContentHistory::new(
                self.config.paths.history_dir.clone(),
            ))),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

const SHORT_SCRIPT: &str = r#"{
    "fact": "Octopuses have three hearts",
    "script": [
        {"text": "octopuses pump blue blood", "keyword": ["octopus", "ocean"]},
        {"text": "two hearts feed the gills while one feeds the body", "keyword": "coral reef"},
        {"text": "swimming stops the main heart", "keyword": ["deep sea"]}
    ]
}"#;

fn short_speech() -> FakeSpeech {
    FakeSpeech {
        durations: HashMap::from([
            ("octopuses pump blue blood".to_string(), 4.0),
            (
                "two hearts feed the gills while one feeds the body".to_string(),
                5.0,
            ),
            ("swimming stops the main heart".to_string(), 3.0),
        ]),
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_parts_concatenate_into_one_video() {
    let ws = Workspace::new();
    let ffmpeg = Arc::new(FakeFfmpeg::default());
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, ffmpeg.clone()),
    );
    let report = pipeline.run(&plan).await.unwrap();

    assert_eq!(pipeline.state(), RunState::Done);
    assert_eq!(report.rendered_count(), 3);
    assert_eq!(report.duration(), Duration::from_secs(12));
    assert_eq!(read_duration(&report.output).unwrap(), 12.0);
    assert_eq!(ffmpeg.segment_calls(), 3);
    assert_eq!(ffmpeg.concat_calls(), 1);

    // contiguous spans, every cue inside its own span
    let mut expected_start = Duration::ZERO;
    for span in &report.spans {
        assert_eq!(span.start, expected_start);
        assert!(!span.cues.is_empty());
        for cue in &span.cues {
            assert!(cue.start >= span.start && cue.end <= span.end, "{cue:?} outside {span:?}");
        }
        expected_start = span.end;
    }
    assert_eq!(report.spans[1].start, Duration::from_secs(4));
    assert_eq!(report.spans[2].start, Duration::from_secs(9));

    assert!(ws.temp_entries().is_empty(), "left behind: {:?}", ws.temp_entries());
}

#[tokio::test]
async fn long_video_takes_one_clip_per_keyword() {
    let ws = Workspace::new().with_provider(1, 10);
    let ffmpeg = Arc::new(FakeFfmpeg::default());
    let script = SHORT_SCRIPT.replace("\"fact\"", "\"topic\"");
    let plan = ScriptPlan::parse_detect(&script).unwrap();
    assert_eq!(plan.kind(), VideoKind::Long);

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, ffmpeg.clone()),
    );
    let report = pipeline.run(&plan).await.unwrap();

    assert_eq!(report.duration(), Duration::from_secs(12));
    assert!(report
        .output
        .ends_with(VideoKind::Long.output_file_name()));
    // narration + one ten-second clip per keyword: [octopus, ocean], [coral reef], [deep sea]
    assert_eq!(ffmpeg.segment_input_counts(), vec![3, 2, 2]);
    for args in ffmpeg.calls.lock().unwrap().iter().filter(|a| is_segment_render(a)) {
        assert!(!args.contains(&"-stream_loop".to_string()));
    }
    assert!(ws.temp_entries().is_empty());
}

#[tokio::test]
async fn finished_run_is_recorded_in_history() {
    let ws = Workspace::new();
    let plan = ScriptPlan::parse_detect(SHORT_SCRIPT).unwrap();
    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, Arc::new(FakeFfmpeg::default())),
    );
    pipeline.run(&plan).await.unwrap();

    let history = JsonContentHistory::new(ws.config.paths.history_dir.clone());
    assert_eq!(
        history.entries(VideoKind::Short).await.unwrap(),
        vec!["Octopuses have three hearts"]
    );
    assert_eq!(history.last_kind().await.unwrap(), Some(VideoKind::Short));
}

#[tokio::test]
async fn failed_downloads_fall_back_to_background_footage() {
    let ws = Workspace::new().with_background();
    let ffmpeg = Arc::new(FakeFfmpeg::default());
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), true, ffmpeg.clone()),
    );
    let report = pipeline.run(&plan).await.unwrap();

    assert_eq!(pipeline.state(), RunState::Done);
    assert_eq!(report.rendered_count(), 3);
    let background = ws.config.paths.background_dir.join("beach.mp4");
    let background = background.to_string_lossy().to_string();
    for args in ffmpeg.calls.lock().unwrap().iter().filter(|a| is_segment_render(a)) {
        assert!(args.contains(&background));
    }
    // fallback assets are never owned by a batch
    assert!(ws.config.paths.background_dir.join("beach.mp4").exists());
    assert!(ws.temp_entries().is_empty());
}

#[tokio::test]
async fn story_without_keywords_uses_fallback() {
    let ws = Workspace::new().with_background();
    let text = "Once upon a time a lighthouse keeper counted every wave";
    let script = format!(r#"{{"title": "The Keeper", "script": "{text}"}}"#);
    let plan = ScriptPlan::parse_detect(&script).unwrap();
    assert_eq!(plan.kind(), VideoKind::Story);

    let speech = FakeSpeech {
        durations: HashMap::from([(text.to_string(), 6.5)]),
    };
    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(speech, false, Arc::new(FakeFfmpeg::default())),
    );
    let report = pipeline.run(&plan).await.unwrap();

    assert_eq!(report.kind, VideoKind::Story);
    assert_eq!(report.duration(), Duration::from_millis(6500));
    assert!(report.output.exists());
}

#[tokio::test]
async fn failed_narration_skips_only_that_part() {
    let ws = Workspace::new();
    let mut speech = short_speech();
    speech.durations.remove("swimming stops the main heart");
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(speech, false, Arc::new(FakeFfmpeg::default())),
    );
    let report = pipeline.run(&plan).await.unwrap();

    assert_eq!(report.rendered_count(), 2);
    assert_eq!(report.duration(), Duration::from_secs(9));
    let skipped: Vec<usize> = report.skipped().map(|(index, _)| index).collect();
    assert_eq!(skipped, vec![2]);
    assert!(ws.temp_entries().is_empty());
}

#[tokio::test]
async fn all_segments_failing_fails_the_run_and_cleans_up() {
    let ws = Workspace::new();
    let ffmpeg = Arc::new(FakeFfmpeg {
        fail_segments: true,
        ..FakeFfmpeg::default()
    });
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, ffmpeg.clone()),
    );
    let err = pipeline.run(&plan).await.unwrap_err();

    assert_eq!(pipeline.state(), RunState::Failed);
    assert!(matches!(err.reason, FailureReason::NoSegments));
    assert_eq!(err.outcomes.len(), 3);
    assert!(err.outcomes.iter().all(|o| o.segment().is_none()));
    assert_eq!(ffmpeg.concat_calls(), 0);
    assert!(!ws
        .config
        .paths
        .output_dir
        .join(VideoKind::Short.output_file_name())
        .exists());
    assert!(ws.temp_entries().is_empty(), "left behind: {:?}", ws.temp_entries());

    let history = JsonContentHistory::new(ws.config.paths.history_dir.clone());
    assert_eq!(history.last_kind().await.unwrap(), None);
}

#[tokio::test]
async fn failed_final_render_fails_the_run_and_cleans_up() {
    let ws = Workspace::new();
    let ffmpeg = Arc::new(FakeFfmpeg {
        fail_concat: true,
        ..FakeFfmpeg::default()
    });
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, ffmpeg.clone()),
    );
    let err = pipeline.run(&plan).await.unwrap_err();

    assert_eq!(pipeline.state(), RunState::Failed);
    assert!(matches!(err.reason, FailureReason::Concatenation(_)));
    assert_eq!(err.outcomes.len(), 3);
    assert!(err.outcomes.iter().all(|o| o.segment().is_some()));
    assert_eq!(ffmpeg.call_counts(), (3, 1));
    assert!(!ws
        .config
        .paths
        .output_dir
        .join(VideoKind::Short.output_file_name())
        .exists());
    assert!(ws.temp_entries().is_empty(), "left behind: {:?}", ws.temp_entries());

    let history = JsonContentHistory::new(ws.config.paths.history_dir.clone());
    assert_eq!(history.last_kind().await.unwrap(), None);
}

#[tokio::test]
async fn vanished_segment_is_left_out_of_the_report() {
    let ws = Workspace::new();
    let ffmpeg = Arc::new(FakeFfmpeg {
        lose_output: Some(VideoKind::Short.segment_file_name(1)),
        ..FakeFfmpeg::default()
    });
    let plan = ScriptPlan::parse(VideoKind::Short, SHORT_SCRIPT).unwrap();

    let mut pipeline = PipelineOrchestrator::new(
        ws.config.clone(),
        ws.collaborators(short_speech(), false, ffmpeg.clone()),
    );
    let report = pipeline.run(&plan).await.unwrap();

    // part 1 rendered "successfully" but its file never reached the concat
    let indices: Vec<usize> = report.spans.iter().map(|span| span.index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(report.duration(), Duration::from_secs(7));
    assert_eq!(read_duration(&report.output).unwrap(), 7.0);
    assert!(ws.temp_entries().is_empty());
}

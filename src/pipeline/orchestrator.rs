//! Full run: narrate -> source footage -> assemble, part by part, then concatenate
//!
//! Parts are processed strictly one after another. Everything a part creates
//! is registered with that part's [`ResourceTracker`] and released before the
//! next part starts; segment files live in a run-wide tracker until the final
//! concatenation has consumed them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::history::ContentHistory;
use super::report::{
    build_spans, FailureReason, PartOutcome, RunError, RunReport, RunState, SkipReason,
};
use super::tracker::ResourceTracker;
use crate::config::{Config, KindProfile};
use crate::footage::{
    ClipRequest, FallbackAssetStore, FootageFetcher, FootageProvider, FootageSourcer,
};
use crate::render::assembler::AssemblerSettings;
use crate::render::{
    EncodeSettings, FfmpegRunner, MediaProbe, Segment, SegmentAssembler, SegmentConcatenator,
    SegmentJob,
};
use crate::script::{ScriptPart, ScriptPlan, VideoKind};
use crate::speech::{narrate, SpeechSynthesizer};
use crate::timeline::Cue;

/// External services a run depends on
pub struct Collaborators {
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub provider: Arc<dyn FootageProvider>,
    pub fetcher: Arc<dyn FootageFetcher>,
    pub probe: Arc<dyn MediaProbe>,
    pub ffmpeg: Arc<dyn FfmpegRunner>,
    pub fallback: Arc<dyn FallbackAssetStore>,
    pub history: Option<Arc<dyn ContentHistory>>,
}

pub struct PipelineOrchestrator {
    config: Config,
    speech: Arc<dyn SpeechSynthesizer>,
    probe: Arc<dyn MediaProbe>,
    sourcer: FootageSourcer,
    assembler: SegmentAssembler,
    concatenator: SegmentConcatenator,
    history: Option<Arc<dyn ContentHistory>>,
    state: RunState,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let sourcer = FootageSourcer::new(
            collaborators.provider,
            collaborators.fetcher,
            collaborators.probe.clone(),
            config.footage.page_size,
        );
        let assembler = SegmentAssembler::new(
            collaborators.ffmpeg.clone(),
            collaborators.probe.clone(),
            collaborators.fallback,
            AssemblerSettings::from_config(&config),
        );
        let concatenator = SegmentConcatenator::new(
            collaborators.ffmpeg,
            EncodeSettings::from_video_settings(&config.video),
        );

        Self {
            config,
            speech: collaborators.speech,
            probe: collaborators.probe,
            sourcer,
            assembler,
            concatenator,
            history: collaborators.history,
            state: RunState::Init,
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Render `plan` into the configured output directory.
    ///
    /// Part failures are recorded and skipped. The run fails only when no
    /// segment was produced or the final render fails; tracked files are
    /// deleted either way.
    pub async fn run(&mut self, plan: &ScriptPlan) -> Result<RunReport, RunError> {
        self.state = RunState::Init;
        let kind = plan.kind();
        let profile = self.config.profile(kind);
        info!(
            "Starting {kind} run: {} parts at {}",
            plan.parts().len(),
            profile.resolution
        );

        if let Err(e) = self.prepare_dirs() {
            self.state = RunState::Failed;
            return Err(RunError {
                reason: FailureReason::Workspace(e.to_string()),
                outcomes: Vec::new(),
            });
        }

        let mut run_tracker = ResourceTracker::new("run segments");
        let mut outcomes = Vec::with_capacity(plan.parts().len());
        let mut rendered: Vec<(Segment, Vec<Cue>)> = Vec::new();

        for (index, part) in plan.parts().iter().enumerate() {
            self.state = RunState::ProcessingParts { index };
            let mut batch = ResourceTracker::new(format!("part {index}"));

            let result = self
                .process_part(index, part, kind, &profile, &mut batch, &mut run_tracker)
                .await;
            let released = batch.release_all();
            info!(
                "Part {index} released {} files ({} already gone)",
                released.removed, released.absent
            );

            match result {
                Ok((segment, cues)) => {
                    outcomes.push(PartOutcome::Rendered(segment.clone()));
                    rendered.push((segment, cues));
                }
                Err(reason) => {
                    warn!("Skipping part {index}: {reason}");
                    outcomes.push(PartOutcome::Skipped { index, reason });
                }
            }
        }

        self.state = RunState::Concatenating;
        if rendered.is_empty() {
            run_tracker.release_all();
            self.state = RunState::Failed;
            return Err(RunError {
                reason: FailureReason::NoSegments,
                outcomes,
            });
        }

        let output = self.config.paths.output_dir.join(kind.output_file_name());
        let segments: Vec<Segment> = rendered.iter().map(|(s, _)| s.clone()).collect();
        let result = self.concatenator.concatenate(&segments, &output).await;
        let released = run_tracker.release_all();
        info!("Released {} segment files", released.removed);

        let used = match result {
            Ok(used) => used,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(RunError {
                    reason: FailureReason::Concatenation(e),
                    outcomes,
                });
            }
        };

        self.state = RunState::Done;
        self.record_history(plan).await;

        // only what actually went into the file counts toward the timeline
        rendered.retain(|(segment, _)| used.contains(&segment.index));

        let report = RunReport {
            kind,
            output,
            metadata: plan.metadata().clone(),
            outcomes,
            spans: build_spans(&rendered),
        };
        info!(
            "Finished {}: {:.2}s from {} segments",
            report.output.display(),
            report.duration().as_secs_f64(),
            report.spans.len()
        );
        Ok(report)
    }

    fn prepare_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config.paths.temp_dir)?;
        std::fs::create_dir_all(&self.config.paths.output_dir)
    }

    fn temp_dir(&self) -> &Path {
        &self.config.paths.temp_dir
    }

    async fn process_part(
        &self,
        index: usize,
        part: &ScriptPart,
        kind: VideoKind,
        profile: &KindProfile,
        batch: &mut ResourceTracker,
        run_tracker: &mut ResourceTracker,
    ) -> Result<(Segment, Vec<Cue>), SkipReason> {
        let audio_path: PathBuf = self
            .temp_dir()
            .join(format!("{}-{index}.mp3", kind.part_prefix()));
        batch.track_temp(&audio_path);

        let narration = narrate(
            self.speech.as_ref(),
            self.probe.as_ref(),
            &part.text,
            &audio_path,
        )
        .await
        .map_err(|e| SkipReason::Narration(format!("{e:#}")))?;

        let request = ClipRequest {
            keywords: part.keywords.clone(),
            min_count: profile.min_clip_count,
            min_duration: narration.audio.duration,
            orientation: profile.orientation,
        };
        let clips = self
            .sourcer
            .acquire(&request, self.temp_dir(), &format!("pexelsClip-{index}"), batch)
            .await;

        let output = self.temp_dir().join(kind.segment_file_name(index));
        run_tracker.track_segment(&output);

        let job = SegmentJob {
            index,
            audio: &narration.audio,
            cues: &narration.cues,
            clips: &clips,
            output: &output,
        };
        let segment = self
            .assembler
            .assemble(&job, &profile.layout, profile.resolution, batch)
            .await?;

        Ok((segment, narration.cues))
    }

    async fn record_history(&self, plan: &ScriptPlan) {
        let Some(history) = &self.history else {
            return;
        };
        let kind = plan.kind();
        if let Some(headline) = &plan.metadata().headline {
            if let Err(e) = history.append(kind, headline).await {
                warn!("Could not record {kind} headline: {e:#}");
            }
        }
        if let Err(e) = history.record_kind(kind).await {
            warn!("Could not record last video kind: {e:#}");
        }
    }
}

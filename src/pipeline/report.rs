//! Run results

use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::render::{RenderError, Segment};
use crate::script::{ScriptMetadata, VideoKind};
use crate::timeline::{format_timestamp, Cue};

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Init,
    ProcessingParts { index: usize },
    Concatenating,
    Done,
    Failed,
}

/// Why a part produced no segment
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("narration failed: {0}")]
    Narration(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// What happened to one script part
#[derive(Debug)]
pub enum PartOutcome {
    Rendered(Segment),
    Skipped { index: usize, reason: SkipReason },
}

impl PartOutcome {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Rendered(segment) => segment.index,
            Self::Skipped { index, .. } => *index,
        }
    }

    #[must_use]
    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Self::Rendered(segment) => Some(segment),
            Self::Skipped { .. } => None,
        }
    }
}

/// Run-fatal conditions
#[derive(Error, Debug)]
pub enum FailureReason {
    #[error("could not prepare working directories: {0}")]
    Workspace(String),

    #[error("no part produced a segment")]
    NoSegments,

    #[error("final render failed: {0}")]
    Concatenation(RenderError),
}

/// Terminal result of a failed run
#[derive(Error, Debug)]
#[error("pipeline run failed: {reason}")]
pub struct RunError {
    pub reason: FailureReason,
    pub outcomes: Vec<PartOutcome>,
}

/// Where one segment's captions sit in the final artifact
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpan {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    /// Cues shifted to final-artifact time
    pub cues: Vec<Cue>,
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub kind: VideoKind,
    pub output: PathBuf,
    pub metadata: ScriptMetadata,
    pub outcomes: Vec<PartOutcome>,
    /// Rendered segments in concatenation order
    pub spans: Vec<SegmentSpan>,
}

impl RunReport {
    /// Length of the final artifact
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.spans.last().map_or(Duration::ZERO, |span| span.end)
    }

    #[must_use]
    pub fn rendered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.segment().is_some()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            PartOutcome::Skipped { index, reason } => Some((*index, reason)),
            PartOutcome::Rendered(_) => None,
        })
    }

    /// Human-readable run summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} video: {}", self.kind, self.output.display());
        if let Some(headline) = &self.metadata.headline {
            let _ = writeln!(out, "  headline: {headline}");
        }
        let _ = writeln!(
            out,
            "  duration: {}  parts: {} rendered, {} skipped",
            format_timestamp(self.duration()),
            self.rendered_count(),
            self.outcomes.len() - self.rendered_count()
        );
        for span in &self.spans {
            let _ = writeln!(
                out,
                "  part {:>2}  {} -> {}  ({} cues)",
                span.index,
                format_timestamp(span.start),
                format_timestamp(span.end),
                span.cues.len()
            );
        }
        for (index, reason) in self.skipped() {
            let _ = writeln!(out, "  part {index:>2}  skipped: {reason}");
        }
        out
    }
}

/// Lay rendered segments end to end and shift their cues accordingly
#[must_use]
pub fn build_spans(rendered: &[(Segment, Vec<Cue>)]) -> Vec<SegmentSpan> {
    let mut offset = Duration::ZERO;
    rendered
        .iter()
        .map(|(segment, cues)| {
            let start = offset;
            offset += segment.duration;
            SegmentSpan {
                index: segment.index,
                start,
                end: offset,
                cues: cues
                    .iter()
                    .map(|cue| Cue {
                        start: (start + cue.start).min(offset),
                        end: (start + cue.end).min(offset),
                        text: cue.text.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}

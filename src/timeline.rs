//! Caption timeline construction from speech-synthesis boundary events
//!
//! The speech service reports word boundaries as `(offset, duration)` pairs in
//! 100-nanosecond ticks. [`TimelineBuilder`] turns them into [`Cue`]s in
//! arrival order, and [`format_timestamp`] / [`parse_timestamp`] provide the
//! `H:MM:SS.mmm` textual form used in cue sheets.

use std::fmt::Write as FmtWrite;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boundary event ticks per second (100 ns resolution)
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Maximum rendered timestamp width
const TIMESTAMP_WIDTH: usize = 11;

/// A word (or sentence) boundary reported by the speech service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryEvent {
    /// Offset from the start of the audio, in 100 ns ticks
    pub offset_ticks: u64,
    /// Spoken duration of the fragment, in 100 ns ticks
    pub duration_ticks: u64,
    /// The text fragment spoken
    pub text: String,
}

impl BoundaryEvent {
    #[must_use]
    pub fn new(offset_ticks: u64, duration_ticks: u64, text: impl Into<String>) -> Self {
        Self {
            offset_ticks,
            duration_ticks,
            text: text.into(),
        }
    }
}

/// A caption's time range and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl Cue {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Convert 100 ns ticks to a [`Duration`]
#[must_use]
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::new(
        ticks / TICKS_PER_SECOND,
        ((ticks % TICKS_PER_SECOND) * 100) as u32,
    )
}

/// Append-only cue list builder.
///
/// Cues keep the order events arrived in. Adjacent cues are never merged. An
/// event whose offset lies before the previous cue's start is clamped forward
/// so `start` stays non-decreasing; `end` is never earlier than `start`.
#[derive(Debug, Default, Clone)]
pub struct TimelineBuilder {
    cues: Vec<Cue>,
}

impl TimelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cue list from a complete event sequence
    pub fn from_events<I>(events: I) -> Vec<Cue>
    where
        I: IntoIterator<Item = BoundaryEvent>,
    {
        let mut builder = Self::new();
        for event in events {
            builder.push(event);
        }
        builder.finish()
    }

    /// Append the cue for one boundary event
    pub fn push(&mut self, event: BoundaryEvent) -> &Cue {
        let mut start = ticks_to_duration(event.offset_ticks);
        let mut end = ticks_to_duration(event.offset_ticks.saturating_add(event.duration_ticks));

        if let Some(previous) = self.cues.last() {
            if start < previous.start {
                start = previous.start;
            }
        }
        if end < start {
            end = start;
        }

        let index = self.cues.len();
        self.cues.push(Cue {
            start,
            end,
            text: event.text,
        });
        &self.cues[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    #[must_use]
    pub fn finish(self) -> Vec<Cue> {
        self.cues
    }
}

/// Timestamp parse failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("timestamp `{0}` has more than three fields")]
    TooManyFields(String),

    #[error("invalid timestamp field `{field}` in `{input}`")]
    InvalidField { input: String, field: String },
}

/// Render a duration as `H:MM:SS.mmm`.
///
/// The value is first written with microsecond precision and then cut to
/// eleven characters, so sub-millisecond digits are truncated, not rounded.
#[must_use]
pub fn format_timestamp(value: Duration) -> String {
    let total_secs = value.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let micros = value.subsec_micros();

    let mut out = format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}");
    out.truncate(TIMESTAMP_WIDTH);
    out
}

/// Parse a `[[H:]M:]S[.fff]` timestamp by summing fields weighted by `60^i`
/// from the least significant one.
pub fn parse_timestamp(input: &str) -> Result<Duration, TimestampError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::Empty);
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() > 3 {
        return Err(TimestampError::TooManyFields(trimmed.to_string()));
    }

    let mut seconds = 0.0_f64;
    for (i, field) in fields.iter().rev().enumerate() {
        let value: f64 = field.parse().map_err(|_| TimestampError::InvalidField {
            input: trimmed.to_string(),
            field: (*field).to_string(),
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(TimestampError::InvalidField {
                input: trimmed.to_string(),
                field: (*field).to_string(),
            });
        }
        seconds += value * 60_f64.powi(i as i32);
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| TimestampError::InvalidField {
        input: trimmed.to_string(),
        field: trimmed.to_string(),
    })
}

/// Human-readable cue listing, one `start --> end  text` line per cue
#[must_use]
pub fn cue_sheet(cues: &[Cue]) -> String {
    let mut out = String::new();
    for cue in cues {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{} --> {}  {}",
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}

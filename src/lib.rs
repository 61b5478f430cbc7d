//! `reelsmith` - narrated stock-footage videos from generated scripts
//!
//! # Features
//!
//! - **Captions from speech timing**: word boundaries from the speech service
//!   become caption cues
//! - **Footage sourcing**: stock clips accepted until both a clip count and a
//!   duration target are met, with a local fallback
//! - **Segmented rendering**: one bounded ffmpeg job per script part, joined
//!   into the final video at the end
//! - **Guaranteed cleanup**: every intermediate file is tracked and deleted
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use reelsmith::footage::{DirectoryFallback, HttpFetcher, PexelsProvider};
//! use reelsmith::pipeline::{Collaborators, JsonContentHistory, PipelineOrchestrator};
//! use reelsmith::render::{FfprobeProbe, SystemFfmpeg};
//! use reelsmith::speech::EdgeTts;
//! use reelsmith::{Config, ScriptPlan};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let plan = ScriptPlan::parse_detect(&std::fs::read_to_string("script.json")?)?;
//!
//!     let collaborators = Collaborators {
//!         speech: Arc::new(EdgeTts::from_settings(&config.speech)),
//!         provider: Arc::new(PexelsProvider::from_env()?),
//!         fetcher: Arc::new(HttpFetcher::new()?),
//!         probe: Arc::new(FfprobeProbe::new()),
//!         ffmpeg: Arc::new(SystemFfmpeg::new()),
//!         fallback: Arc::new(DirectoryFallback),
//!         history: Some(Arc::new(JsonContentHistory::new(&config.paths.history_dir))),
//!     };
//!
//!     let mut pipeline = PipelineOrchestrator::new(config, collaborators);
//!     let report = pipeline.run(&plan).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod footage;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod speech;
pub mod timeline;

pub use config::{Config, KindProfile};
pub use footage::{ClipAsset, ClipRequest, FootageCandidate, FootageSourcer, Orientation};
pub use pipeline::{
    Collaborators, ContentHistory, PipelineOrchestrator, ResourceTracker, RunError, RunReport,
};
pub use render::{RenderError, Resolution, Segment, SegmentAssembler};
pub use script::{ScriptError, ScriptPart, ScriptPlan, VideoKind};
pub use speech::{SpeechChunk, SpeechSynthesizer};
pub use timeline::{format_timestamp, parse_timestamp, BoundaryEvent, Cue, TimelineBuilder};

/// Version of reelsmith
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Stock footage sourcing
//!
//! A [`FootageProvider`] ranks candidates for a keyword, a [`FootageFetcher`]
//! brings an accepted candidate to local disk, and [`FootageSourcer`] ties
//! them together under the dual count/duration stopping rule. When nothing
//! usable comes back, a [`FallbackAssetStore`] supplies a local asset.

pub mod fallback;
pub mod fetch;
pub mod pexels;
pub mod sourcer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::render::Resolution;

pub use fallback::{DirectoryFallback, FallbackAssetStore};
pub use fetch::HttpFetcher;
pub use pexels::PexelsProvider;
pub use sourcer::{select_candidates, Accumulation, FootageSourcer};

/// Requested footage orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Query value understood by footage APIs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a part needs from the footage sourcer
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub keywords: Vec<String>,
    /// Minimum number of accepted clips, if any
    pub min_count: Option<usize>,
    /// Minimum accumulated footage duration
    pub min_duration: Duration,
    pub orientation: Orientation,
}

/// A ranked search result, before download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootageCandidate {
    pub download_url: String,
    /// `None` when the provider does not know the duration
    pub duration: Option<Duration>,
    pub resolution: Option<Resolution>,
}

/// A piece of footage on local disk, owned by the current batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipAsset {
    pub source_uri: String,
    pub local_path: PathBuf,
    pub duration: Duration,
    pub resolution: Option<Resolution>,
}

/// Footage search collaborator
#[async_trait]
pub trait FootageProvider: Send + Sync {
    /// Ranked candidates for one keyword
    async fn search(
        &self,
        keyword: &str,
        orientation: Orientation,
        page_size: u32,
    ) -> Result<Vec<FootageCandidate>>;
}

/// Footage download collaborator
#[async_trait]
pub trait FootageFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the written path
    async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf>;
}

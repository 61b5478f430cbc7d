//! Pexels video search provider
//!
//! `GET https://api.pexels.com/videos/search` with the API key in the
//! `Authorization` header. Each result contributes the link of its first
//! video file and the whole-video duration (which Pexels may leave null).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FootageCandidate, FootageProvider, Orientation};
use crate::config::PEXELS_API_KEY_ENV;
use crate::render::Resolution;

const SEARCH_ENDPOINT: &str = "https://api.pexels.com/videos/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<VideoResult>,
}

#[derive(Debug, Deserialize)]
struct VideoResult {
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl VideoResult {
    fn into_candidate(self) -> Option<FootageCandidate> {
        let file = self.video_files.into_iter().next()?;
        let resolution = match (file.width.or(self.width), file.height.or(self.height)) {
            (Some(w), Some(h)) => Some(Resolution::new(w, h)),
            _ => None,
        };
        Some(FootageCandidate {
            download_url: file.link,
            duration: self.duration.map(Duration::from_secs),
            resolution,
        })
    }
}

/// Footage provider backed by the Pexels video API
pub struct PexelsProvider {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl PexelsProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .gzip(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: SEARCH_ENDPOINT.to_string(),
        })
    }

    /// Create a provider using the key from `PEXELS_API_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(PEXELS_API_KEY_ENV)
            .map_err(|_| anyhow!("{PEXELS_API_KEY_ENV} is not set"))?;
        Self::new(key)
    }

    /// Point the provider at a different search endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl FootageProvider for PexelsProvider {
    #[instrument(skip(self))]
    async fn search(
        &self,
        keyword: &str,
        orientation: Orientation,
        page_size: u32,
    ) -> Result<Vec<FootageCandidate>> {
        let page_size = page_size.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", keyword),
                ("per_page", page_size.as_str()),
                ("size", "medium"),
                ("orientation", orientation.as_str()),
            ])
            .send()
            .await
            .context("Pexels search request failed")?
            .error_for_status()
            .context("Pexels search returned an error status")?;

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to decode Pexels search response")?;

        let candidates: Vec<FootageCandidate> = body
            .videos
            .into_iter()
            .filter_map(VideoResult::into_candidate)
            .collect();

        debug!("Pexels returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

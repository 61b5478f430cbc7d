//! Footage acquisition under the dual-target stopping rule
//!
//! Every keyword is searched. Within one keyword's ranked results, candidates
//! are accepted until the accepted count reaches the requested minimum (when
//! one is given) AND the duration accepted for that keyword reaches the
//! requested minimum. The count runs across keywords; the duration starts
//! over with each keyword. Meeting only one of the two targets keeps the scan
//! going; only running out of candidates ends it early.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ClipAsset, ClipRequest, FootageCandidate, FootageFetcher, FootageProvider};
use crate::pipeline::ResourceTracker;
use crate::render::MediaProbe;

/// Running totals of accepted candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulation {
    /// Accepted across all keywords so far
    pub count: usize,
    /// Accepted for the keyword being scanned
    pub duration: Duration,
}

impl Accumulation {
    /// Start the next keyword: keep the count, reset the duration
    pub fn next_keyword(&mut self) {
        self.duration = Duration::ZERO;
    }

    /// True once both targets of `request` are met
    #[must_use]
    pub fn satisfies(&self, request: &ClipRequest) -> bool {
        let count_met = request.min_count.map_or(true, |min| self.count >= min);
        count_met && self.duration >= request.min_duration
    }
}

/// Apply the stopping rule to one ranked candidate stream.
///
/// Candidates without a duration are skipped and do not count. The stream is
/// consumed lazily, so an unbounded iterator is fine as long as the targets
/// are reachable.
pub fn select_candidates<I>(
    candidates: I,
    request: &ClipRequest,
    accumulation: &mut Accumulation,
) -> Vec<FootageCandidate>
where
    I: IntoIterator<Item = FootageCandidate>,
{
    let mut selected = Vec::new();

    for candidate in candidates {
        if accumulation.satisfies(request) {
            break;
        }
        let Some(duration) = candidate.duration else {
            continue;
        };
        accumulation.count += 1;
        accumulation.duration += duration;
        selected.push(candidate);
    }

    selected
}

/// Turns a [`ClipRequest`] into downloaded, probed [`ClipAsset`]s
pub struct FootageSourcer {
    provider: Arc<dyn FootageProvider>,
    fetcher: Arc<dyn FootageFetcher>,
    probe: Arc<dyn MediaProbe>,
    page_size: u32,
}

impl FootageSourcer {
    #[must_use]
    pub fn new(
        provider: Arc<dyn FootageProvider>,
        fetcher: Arc<dyn FootageFetcher>,
        probe: Arc<dyn MediaProbe>,
        page_size: u32,
    ) -> Self {
        Self {
            provider,
            fetcher,
            probe,
            page_size,
        }
    }

    /// Acquire footage for one part.
    ///
    /// Every download destination is registered with `batch` before the
    /// download starts. Failed searches, downloads and probes are logged and
    /// skipped; the result may be empty.
    pub async fn acquire(
        &self,
        request: &ClipRequest,
        dest_dir: &Path,
        clip_prefix: &str,
        batch: &mut ResourceTracker,
    ) -> Vec<ClipAsset> {
        let mut accumulation = Accumulation::default();
        let mut selected = Vec::new();

        for keyword in &request.keywords {
            accumulation.next_keyword();
            let candidates = match self
                .provider
                .search(keyword, request.orientation, self.page_size)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Footage search for {keyword:?} failed: {e:#}");
                    continue;
                }
            };

            let picked = select_candidates(candidates, request, &mut accumulation);
            debug!(
                "Keyword {keyword:?}: accepted {} candidates ({} total, {:.1}s)",
                picked.len(),
                accumulation.count,
                accumulation.duration.as_secs_f64()
            );
            selected.extend(picked);
        }

        let mut assets = Vec::with_capacity(selected.len());
        for (n, candidate) in selected.into_iter().enumerate() {
            let dest = dest_dir.join(format!("{clip_prefix}-{n}.mp4"));
            batch.track_temp(&dest);

            match self.fetch_one(&candidate, &dest).await {
                Ok(asset) => assets.push(asset),
                Err(e) => warn!("Skipping clip {}: {e:#}", candidate.download_url),
            }
        }

        info!(
            "Acquired {} clips for keywords {:?}",
            assets.len(),
            request.keywords
        );
        assets
    }

    async fn fetch_one(&self, candidate: &FootageCandidate, dest: &Path) -> anyhow::Result<ClipAsset> {
        let local_path: PathBuf = self.fetcher.download(&candidate.download_url, dest).await?;
        let media = self.probe.probe(&local_path).await?;

        Ok(ClipAsset {
            source_uri: candidate.download_url.clone(),
            local_path,
            duration: media.duration,
            resolution: media.resolution.or(candidate.resolution),
        })
    }
}

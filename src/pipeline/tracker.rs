//! Scoped ownership of intermediate files
//!
//! A [`ResourceTracker`] remembers every temp file and segment file created
//! under it and deletes them all on [`release_all`](ResourceTracker::release_all)
//! or, failing that, when it is dropped.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Outcome of a release pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Files deleted
    pub removed: usize,
    /// Files that were already gone
    pub absent: usize,
    /// Files that could not be deleted
    pub failed: usize,
}

impl ReleaseSummary {
    fn merge(&mut self, other: Self) {
        self.removed += other.removed;
        self.absent += other.absent;
        self.failed += other.failed;
    }
}

#[derive(Debug)]
pub struct ResourceTracker {
    label: String,
    temp_files: Vec<PathBuf>,
    segment_files: Vec<PathBuf>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            temp_files: Vec::new(),
            segment_files: Vec::new(),
        }
    }

    /// Register a temp file; registering the same path twice is a no-op
    pub fn track_temp(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.temp_files.iter().any(|p| p == path) {
            self.temp_files.push(path.to_path_buf());
        }
    }

    /// Register a rendered segment file
    pub fn track_segment(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.segment_files.iter().any(|p| p == path) {
            self.segment_files.push(path.to_path_buf());
        }
    }

    #[must_use]
    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temp_files.is_empty() && self.segment_files.is_empty()
    }

    /// Delete every tracked file and forget them.
    ///
    /// Missing files are counted as absent, not as failures.
    pub fn release_all(&mut self) -> ReleaseSummary {
        let mut summary = remove_all(std::mem::take(&mut self.temp_files));
        summary.merge(remove_all(std::mem::take(&mut self.segment_files)));

        debug!(
            "Released {}: {} removed, {} absent, {} failed",
            self.label, summary.removed, summary.absent, summary.failed
        );
        summary
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if !self.is_empty() {
            debug!("Releasing {} on drop", self.label);
            self.release_all();
        }
    }
}

fn remove_all(paths: Vec<PathBuf>) -> ReleaseSummary {
    let mut summary = ReleaseSummary::default();
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => summary.removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
                summary.absent += 1;
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }
    summary
}

//! Documents and generation job records shared by the pipeline and view model.

use std::fmt;
use std::path::{Path, PathBuf};

/// A PDF file in the active folder, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    path: PathBuf,
    name: String,
}

impl Document {
    /// Creates a document; the display name is the path's basename.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Identifier of one requested document set. Strictly increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The epoch following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal state of one generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The thumbnail is available at this path (cache hit or fresh render).
    Ready(PathBuf),
    /// Generation failed; the path points at the placeholder image.
    Failed(PathBuf),
}

impl JobOutcome {
    /// Image path to display, whatever the outcome.
    pub fn image_path(&self) -> &Path {
        match self {
            JobOutcome::Ready(path) | JobOutcome::Failed(path) => path,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, JobOutcome::Ready(_))
    }
}

/// One result emitted by the pipeline for one document of one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub document_path: PathBuf,
    pub epoch: Epoch,
    pub outcome: JobOutcome,
}

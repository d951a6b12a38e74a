//! Set of favorited document paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet {
    paths: HashSet<PathBuf>,
}

impl FavoriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Adds the path if absent, removes it otherwise. Returns the new membership.
    pub fn toggle(&mut self, path: &Path) -> bool {
        if self.paths.remove(path) {
            false
        } else {
            self.paths.insert(path.to_path_buf());
            true
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in sorted order, so the persisted form is stable.
    pub fn sorted_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.paths.iter().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

//! Source volume measurement used to scale package nodes.

use crate::config::{ConfigError, SizeConfig};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;

/// Anything that can report how much source lives under a directory.
pub trait SourceVolume {
    /// Size of the source under `path`, in whole kilobytes.
    fn kilobytes(&self, path: &Path) -> u64;
}

/// Sums the byte size of matching files below a package directory.
#[derive(Debug, Clone)]
pub struct FileSizeMeter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileSizeMeter {
    pub fn new(config: &SizeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: build_glob_set(&config.include)?,
            exclude: build_glob_set(&config.exclude)?,
        })
    }

    fn counts(&self, rel: &Path) -> bool {
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }
}

impl SourceVolume for FileSizeMeter {
    fn kilobytes(&self, path: &Path) -> u64 {
        if !path.is_dir() {
            return 0;
        }
        let walker = ignore::WalkBuilder::new(path)
            .hidden(true)
            .git_ignore(false)
            .build();

        let mut bytes = 0u64;
        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(path) else {
                continue;
            };
            if !self.counts(rel) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => bytes += meta.len(),
                Err(e) => warn!(path = %entry.path().display(), "failed to stat file: {}", e),
            }
        }
        bytes / 1024
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ConfigError::Invalid(format!("invalid size glob {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("invalid size glob set: {}", e)))
}

//! Export set - the files that make up the distributable source tree.
//!
//! Patterns are matched against paths relative to the source root. `*` also
//! matches across `/`, so `src/*` selects everything below `src`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use tracing::debug;
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled export patterns.
#[derive(Debug, Clone)]
pub struct ExportSet {
    patterns: Vec<Pattern>,
}

impl ExportSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid export pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, relative: &Path) -> bool {
        // Patterns use '/' regardless of platform
        let normalized = relative.to_string_lossy().replace('\\', "/");
        self.patterns
            .iter()
            .any(|p| p.matches_with(&normalized, MATCH_OPTIONS))
    }

    /// Collect matching files under `root`, sorted, as root-relative paths.
    ///
    /// Directories named in `skip` (e.g. build folders) are not descended into.
    pub fn collect(&self, root: &Path, skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
            !skip.iter().any(|s| e.path() == s.as_path())
        });

        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("{} escaped {}", entry.path().display(), root.display()))?;
            if self.matches(relative) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        debug!(count = files.len(), root = %root.display(), "collected export set");
        Ok(files)
    }

    /// Copy the export set from `root` into `dest`, preserving relative paths.
    pub fn copy_to(&self, root: &Path, dest: &Path, skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let files = self.collect(root, skip)?;
        for relative in &files {
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            std::fs::copy(root.join(relative), &target)
                .with_context(|| format!("Failed to copy {}", relative.display()))?;
        }
        Ok(files)
    }
}

//! Path filtering for inventory discovery using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter owns include/exclude evaluation
//! - Patterns apply in order; the last matching pattern decides
//! - A leading `!` turns an exclude into a re-include
//! - Patterns without a slash match the file name, others match the relative path

use crate::domain::violations::{ConformanceError, ConformanceResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Decides which files under an inventory root are read
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<FilterPattern>,
}

#[derive(Debug, Clone)]
struct FilterPattern {
    pattern: glob::Pattern,
    is_include: bool,
    matches_name_only: bool,
}

impl PathFilter {
    /// Create a new path filter with the given patterns
    pub fn new(patterns: Vec<String>) -> ConformanceResult<Self> {
        let mut filter = Self::default();
        for pattern in patterns {
            filter.add_pattern(pattern)?;
        }
        Ok(filter)
    }

    /// Add a pattern to the filter
    pub fn add_pattern(&mut self, pattern: String) -> ConformanceResult<()> {
        let (is_include, pattern_str) = match pattern.strip_prefix('!') {
            Some(stripped) => (true, stripped.to_string()),
            None => (false, pattern),
        };

        let glob_pattern = glob::Pattern::new(&pattern_str).map_err(|e| {
            ConformanceError::config(format!("Invalid pattern '{pattern_str}': {e}"))
        })?;

        self.patterns.push(FilterPattern {
            pattern: glob_pattern,
            is_include,
            matches_name_only: !pattern_str.contains('/'),
        });
        Ok(())
    }

    /// Whether a path (relative to its inventory root) should be read
    pub fn should_include(&self, relative: &Path) -> bool {
        let path_str = relative.to_string_lossy();
        let file_name = relative
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();

        let mut include = true;
        for pattern in &self.patterns {
            let matches = if pattern.matches_name_only {
                pattern.pattern.matches(&file_name)
            } else {
                pattern.pattern.matches(&path_str)
            };
            if matches {
                include = pattern.is_include;
            }
        }
        include
    }

    /// All included files under `root`, sorted for a stable load order
    pub fn find_files(&self, root: &Path) -> ConformanceResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ConformanceError::load(root.display().to_string(), format!("Failed to walk: {e}"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.should_include(relative) {
                files.push(entry.path().to_path_buf());
            }
        }

        Ok(files)
    }
}

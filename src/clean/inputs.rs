use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{DEFAULT_KEY_STEM, DEFAULT_SUFFIX};
use crate::error::ScrapeError;

/// Glob matching the per-year review files inside `data_dir`.
pub fn review_pattern(data_dir: &Path) -> String {
    format!(
        "{}/{}_*{}",
        Pattern::escape(&data_dir.to_string_lossy()),
        DEFAULT_KEY_STEM,
        DEFAULT_SUFFIX
    )
}

/// Sorted review files in `data_dir`; none at all is an error naming the pattern.
pub fn find_review_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = review_pattern(data_dir);
    let mut files = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("invalid glob {}", pattern))? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!(pattern = %pattern, count = files.len(), "matched review files");

    if files.is_empty() {
        return Err(ScrapeError::NoInputFiles { pattern }.into());
    }
    Ok(files)
}

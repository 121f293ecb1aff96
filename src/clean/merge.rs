// src/clean/merge.rs
use anyhow::{Context, Result};
use std::{fs, path::PathBuf, time::Instant};
use tracing::{info, instrument};

use crate::clean::inputs::find_review_files;
use crate::clean::query::{merge_sql, BlankPolicy};
use crate::duck::Engine;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub data_dir: PathBuf,
    pub out: PathBuf,
    pub blank_policy: BlankPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub input_files: usize,
    pub rows_written: u64,
}

/// Merge every review file in `data_dir` into one cleaned Parquet file.
///
/// Runs as a single scan/filter/write statement, so nothing intermediate is
/// left behind.
#[instrument(level = "info", skip(engine), fields(data_dir = %opts.data_dir.display()))]
pub fn merge_clean(engine: &Engine, opts: &MergeOptions) -> Result<MergeReport> {
    let start = Instant::now();
    let files = find_review_files(&opts.data_dir)?;
    info!(files = files.len(), policy = ?opts.blank_policy, "merging");

    if let Some(parent) = opts.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    engine
        .execute(&merge_sql(&files, opts.blank_policy, &opts.out))
        .with_context(|| format!("writing {}", opts.out.display()))?;

    let rows_written = engine.count_rows(&opts.out)?;
    info!(
        out = %opts.out.display(),
        rows = rows_written,
        elapsed = ?start.elapsed(),
        "wrote merged + cleaned parquet"
    );
    Ok(MergeReport {
        input_files: files.len(),
        rows_written,
    })
}

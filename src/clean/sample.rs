// src/clean/sample.rs
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::{debug, info, instrument};

use crate::clean::inputs::find_review_files;
use crate::clean::query::sample_sql;
use crate::duck::Engine;

pub const DEFAULT_ROWS_PER_FILE: u64 = 5000;

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub data_dir: PathBuf,
    pub rows_per_file: u64,
    pub out: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub input_files: usize,
    pub rows_written: u64,
    /// Rows taken from each source file, by file name.
    pub per_file: Vec<(String, u64)>,
}

/// Take up to `rows_per_file` rows from every review file and write them to one Parquet file.
///
/// Rows are picked by review-id hash, so the same inputs always give the same sample.
/// No validity filtering is applied.
#[instrument(level = "info", skip(engine), fields(data_dir = %opts.data_dir.display()))]
pub fn sample_reviews(engine: &Engine, opts: &SampleOptions) -> Result<SampleReport> {
    let files = find_review_files(&opts.data_dir)?;
    info!(files = files.len(), n = opts.rows_per_file, "sampling");

    if let Some(parent) = opts.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    engine
        .execute(&sample_sql(&files, opts.rows_per_file, &opts.out))
        .with_context(|| format!("writing {}", opts.out.display()))?;

    let per_file = engine.count_by_source(&opts.out)?;
    for (name, n) in &per_file {
        debug!(file = %name, rows = n, "sampled");
    }
    let rows_written = per_file.iter().map(|(_, n)| n).sum();
    info!(
        out = %opts.out.display(),
        rows = rows_written,
        expected_max = files.len() as u64 * opts.rows_per_file,
        "wrote combined sample"
    );

    Ok(SampleReport {
        input_files: files.len(),
        rows_written,
        per_file,
    })
}

// src/fetch/mod.rs
//! Listing, size probing and budget-bounded downloading of the review files.

pub mod download;
pub mod listing;
pub mod probe;
pub mod select;

use anyhow::Result;
use tracing::{info, instrument};

use crate::config::{bytes_to_gib, FetchConfig};
use crate::error::ScrapeError;

pub use download::{download_file, folder_bytes, Downloader, FileStatus, RunSummary};
pub use listing::{list_keys, HttpListing, ListingPage, ListingSource};
pub use probe::head_size;
pub use select::{select_years, KeyClassifier, KeyKind, RemoteFile, YearIndex};

/// List the bucket and group its keys by year, decade and everything else.
pub async fn index_listing<S>(source: &S, cfg: &FetchConfig) -> Result<YearIndex>
where
    S: ListingSource + Sync + ?Sized,
{
    let keys = list_keys(source, &cfg.prefix, &cfg.file_suffix).await?;
    if keys.is_empty() {
        return Err(ScrapeError::EmptyListing {
            prefix: cfg.prefix.clone(),
            suffix: cfg.file_suffix.clone(),
        }
        .into());
    }
    let classifier = KeyClassifier::new(&cfg.key_stem, &cfg.file_suffix)?;
    Ok(YearIndex::from_keys(&keys, &classifier))
}

/// List, select the target years, then download until the budget is met.
#[instrument(level = "info", skip_all)]
pub async fn acquire(downloader: &Downloader, cfg: &FetchConfig) -> Result<RunSummary> {
    let listing = HttpListing::new(downloader.client().clone(), cfg.base_url.clone());
    let index = index_listing(&listing, cfg).await?;
    let mut chosen = select_years(&index, cfg)?;

    let summary = downloader.run(&mut chosen).await?;
    info!(
        folder_gib = %format!("{:.2}", bytes_to_gib(summary.folder_bytes)),
        files = summary.reports.len(),
        budget_reached = summary.budget_reached,
        "finished"
    );
    Ok(summary)
}

use reqwest::StatusCode;
use thiserror::Error;

/// Fatal conditions a caller may want to tell apart from plain I/O or engine failures.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("listing under prefix {prefix:?} returned no {suffix} files")]
    EmptyListing { prefix: String, suffix: String },

    #[error("none of the target years {0:?} were found in the listing")]
    NoTargetYears(Vec<i32>),

    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },

    #[error("no files matched: {pattern}")]
    NoInputFiles { pattern: String },
}

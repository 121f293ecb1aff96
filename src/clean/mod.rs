// src/clean/mod.rs
//! Cleaning, merging and sampling of downloaded review files.

pub mod inputs;
pub mod merge;
pub mod query;
pub mod sample;

pub use inputs::{find_review_files, review_pattern};
pub use merge::{merge_clean, MergeOptions, MergeReport};
pub use query::{BlankPolicy, Projection, RowFilter, SourceTag, TextColumn};
pub use sample::{sample_reviews, SampleOptions, SampleReport};

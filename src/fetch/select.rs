// src/fetch/select.rs
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::ScrapeError;

/// A remote object chosen for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub key: String,
    pub url: String,
    pub year: Option<i32>,
    /// Filled by the size prober; `None` means unknown.
    pub size_bytes: Option<u64>,
}

impl RemoteFile {
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// What a listed key represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// `…_2015.snappy.parquet`
    Year(i32),
    /// `…_2010s.snappy.parquet`, an aggregate of a whole decade
    Decade(i32),
    Other,
}

/// Recognises `<stem>_<YYYY>[s]<suffix>` keys.
pub struct KeyClassifier {
    re: Regex,
}

impl KeyClassifier {
    pub fn new(stem: &str, suffix: &str) -> Result<Self> {
        let pattern = format!(
            r"{}_(\d{{4}})(s?){}$",
            regex::escape(stem),
            regex::escape(suffix)
        );
        Ok(Self {
            re: Regex::new(&pattern)?,
        })
    }

    pub fn classify(&self, key: &str) -> KeyKind {
        let Some(caps) = self.re.captures(key) else {
            return KeyKind::Other;
        };
        let Ok(year) = caps[1].parse::<i32>() else {
            return KeyKind::Other;
        };
        if caps[2].is_empty() {
            KeyKind::Year(year)
        } else {
            KeyKind::Decade(year)
        }
    }
}

/// Listing keys grouped by kind.
#[derive(Debug, Default)]
pub struct YearIndex {
    pub by_year: BTreeMap<i32, String>,
    pub decades: Vec<String>,
    pub others: Vec<String>,
}

impl YearIndex {
    pub fn from_keys(keys: &[String], classifier: &KeyClassifier) -> Self {
        let mut index = Self::default();
        for key in keys {
            match classifier.classify(key) {
                KeyKind::Year(y) => {
                    index.by_year.insert(y, key.clone());
                }
                KeyKind::Decade(_) => index.decades.push(key.clone()),
                KeyKind::Other => index.others.push(key.clone()),
            }
        }
        index
    }
}

/// Pick one file per target year, in the order the years are given.
///
/// Missing years are logged and skipped. An empty result is fatal.
pub fn select_years(index: &YearIndex, cfg: &FetchConfig) -> Result<Vec<RemoteFile>> {
    let mut chosen = Vec::with_capacity(cfg.target_years.len());

    for &year in &cfg.target_years {
        let Some(key) = index.by_year.get(&year) else {
            warn!(year, "year not available, skipping");
            continue;
        };
        chosen.push(RemoteFile {
            key: key.clone(),
            url: cfg.object_url(key)?.to_string(),
            year: Some(year),
            size_bytes: None,
        });
    }

    if chosen.is_empty() {
        return Err(ScrapeError::NoTargetYears(cfg.target_years.clone()).into());
    }
    info!(selected = chosen.len(), "target files selected");
    Ok(chosen)
}

// src/config.rs

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use tracing::info;
use url::Url;

/// Public bucket hosting the review dataset.
pub const DEFAULT_BASE_URL: &str = "https://datasets-documentation.s3.eu-west-3.amazonaws.com/";
/// Every dataset file is named `<stem>_<year>.<suffix>` (or `<stem>_<decade>s.<suffix>`).
pub const DEFAULT_KEY_STEM: &str = "amazon_reviews";
pub const DEFAULT_SUFFIX: &str = ".snappy.parquet";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Everything the listing client, prober and download manager need to know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Bucket root; object URLs are `base_url + key`.
    pub base_url: Url,
    pub prefix: String,
    pub out_dir: PathBuf,
    pub key_stem: String,
    pub file_suffix: String,
    /// Stop once the output directory holds at least this many bytes.
    pub target_bytes: u64,
    /// Years to fetch, in priority order.
    pub target_years: Vec<i32>,
    pub chunk_bytes: usize,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            // constant, always parses
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url"),
            prefix: format!("{}/", DEFAULT_KEY_STEM),
            out_dir: PathBuf::from("data_cleaning/amazon16"),
            key_stem: DEFAULT_KEY_STEM.to_string(),
            file_suffix: DEFAULT_SUFFIX.to_string(),
            target_bytes: 16 * 1024 * 1024 * 1024,
            target_years: (2010..=2015).collect(),
            chunk_bytes: 8 * 1024 * 1024,
            timeout_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full object URL for a listed key.
    pub fn object_url(&self, key: &str) -> Result<Url> {
        self.base_url
            .join(key)
            .with_context(|| format!("joining key {} onto {}", key, self.base_url))
    }

    /// Local path a key downloads to: its base name inside `out_dir`.
    pub fn local_path(&self, key: &str) -> PathBuf {
        let name = key.rsplit('/').next().unwrap_or(key);
        self.out_dir.join(name)
    }
}

/// Layer defaults, an optional TOML file, then `REVIEWS_*` environment variables.
pub fn load_config(file: Option<&Path>) -> Result<FetchConfig> {
    info!(file = ?file, "loading fetch configuration");

    let mut figment = Figment::from(Serialized::defaults(FetchConfig::default()));
    if let Some(path) = file {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("REVIEWS_"));

    figment.extract().with_context(|| match file {
        Some(path) => format!("parsing config from {} and REVIEWS_* env", path.display()),
        None => "parsing config from REVIEWS_* env".to_string(),
    })
}

pub fn bytes_to_gib(n: u64) -> f64 {
    n as f64 / GIB
}

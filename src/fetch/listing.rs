// src/fetch/listing.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::ScrapeError;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Key>([^<]+)</Key>").expect("key regex should compile"));
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<NextContinuationToken>([^<]+)</NextContinuationToken>")
        .expect("token regex should compile")
});

/// One page of a bucket listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

impl ListingPage {
    /// Pull every `<Key>` and the optional `<NextContinuationToken>` out of a listing document.
    pub fn parse(doc: &str) -> Self {
        let keys = KEY_RE
            .captures_iter(doc)
            .map(|c| c[1].to_string())
            .collect();
        let next_token = TOKEN_RE.captures(doc).map(|c| c[1].to_string());
        Self { keys, next_token }
    }
}

/// Supplies raw listing documents, one page at a time.
#[async_trait]
pub trait ListingSource {
    async fn fetch_page(&self, prefix: &str, token: Option<&str>) -> Result<String>;
}

/// S3-style `GET ?prefix=…&continuation-token=…` listing over HTTP.
pub struct HttpListing {
    client: Client,
    base: Url,
}

impl HttpListing {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }
}

#[async_trait]
impl ListingSource for HttpListing {
    async fn fetch_page(&self, prefix: &str, token: Option<&str>) -> Result<String> {
        let mut req = self.client.get(self.base.clone()).query(&[("prefix", prefix)]);
        if let Some(token) = token {
            req = req.query(&[("continuation-token", token)]);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("GET {} (prefix {})", self.base, prefix))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                method: "GET",
                url: self.base.to_string(),
                status,
            }
            .into());
        }
        resp.text()
            .await
            .with_context(|| format!("reading listing body from {}", self.base))
    }
}

/// Walk every page under `prefix` and keep the keys ending in `suffix`.
///
/// Any failed page aborts the whole listing; no partial result is returned.
#[instrument(level = "info", skip(source))]
pub async fn list_keys<S>(source: &S, prefix: &str, suffix: &str) -> Result<Vec<String>>
where
    S: ListingSource + Sync + ?Sized,
{
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let doc = source.fetch_page(prefix, token.as_deref()).await?;
        let page = ListingPage::parse(&doc);
        pages += 1;
        debug!(page = pages, keys = page.keys.len(), "listing page");
        keys.extend(page.keys);

        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    keys.retain(|k| k.ends_with(suffix));
    info!(pages, keys = keys.len(), "listing complete");
    Ok(keys)
}

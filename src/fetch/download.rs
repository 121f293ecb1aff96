// src/fetch/download.rs
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{header::RANGE, Client, StatusCode};
use std::{
    io::ErrorKind,
    path::Path,
    time::{Duration, Instant},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, info, instrument, warn};

use crate::config::{bytes_to_gib, FetchConfig};
use crate::error::ScrapeError;
use crate::fetch::probe::head_size;
use crate::fetch::select::RemoteFile;

/// Result of streaming one object to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Bytes on disk for this file afterwards: kept prefix plus streamed body.
    pub bytes: u64,
    /// Bytes that were already on disk and kept (0 after a restart).
    pub resumed_from: u64,
    /// Server ignored the range request, so the partial file was overwritten.
    pub restarted: bool,
    pub elapsed: Duration,
}

/// Size of `path`, or `None` if it does not exist.
async fn local_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("stat {}", path.display())),
    }
}

/// Stream `url` into `dest`, resuming from whatever is already there.
///
/// A `206` answer to the range request appends; a `200` answer means the
/// server cannot resume, and the file is truncated and written from scratch.
/// Any other non-success status is an error. Bytes flushed before a failure
/// stay on disk for the next run to resume from.
#[instrument(level = "debug", skip(client, dest, chunk_bytes), fields(dest = %dest.display()))]
pub async fn download_file(
    client: &Client,
    url: &str,
    dest: &Path,
    chunk_bytes: usize,
) -> Result<DownloadOutcome> {
    let start = Instant::now();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let mut existing = local_size(dest).await?.unwrap_or(0);

    let mut req = client.get(url);
    if existing > 0 {
        req = req.header(RANGE, format!("bytes={}-", existing));
    }
    let resp = req.send().await.with_context(|| format!("GET {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            method: "GET",
            url: url.to_string(),
            status,
        }
        .into());
    }

    let restarted = existing > 0 && status == StatusCode::OK;
    if restarted {
        warn!(%url, discarded = existing, "server ignored range request; restarting from zero");
        existing = 0;
    }

    let file = if existing > 0 {
        OpenOptions::new()
            .append(true)
            .open(dest)
            .await
            .with_context(|| format!("opening {} for append", dest.display()))?
    } else {
        // create() truncates any stale partial content
        File::create(dest)
            .await
            .with_context(|| format!("creating {}", dest.display()))?
    };
    let mut out = BufWriter::with_capacity(chunk_bytes, file);

    let mut written = existing;
    let mut body = resp.bytes_stream();
    let streamed: Result<()> = async {
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("reading body of {}", url))?;
            if chunk.is_empty() {
                continue;
            }
            out.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", dest.display()))?;
            written += chunk.len() as u64;
        }
        Ok(())
    }
    .await;

    // flush even on failure so the partial file is resumable
    let flushed = out.flush().await;
    streamed?;
    flushed.with_context(|| format!("flushing {}", dest.display()))?;

    Ok(DownloadOutcome {
        bytes: written,
        resumed_from: existing,
        restarted,
        elapsed: start.elapsed(),
    })
}

/// Total size of the `.parquet` files currently in `dir`.
///
/// The budget is always reconciled against this scan rather than a running
/// counter, so leftovers from earlier or interrupted runs are accounted for.
pub async fn folder_bytes(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(".parquet") {
            continue;
        }
        let meta = entry.metadata().await?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

/// What happened to one selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Local copy already at least as large as the remote object.
    Skipped { local_bytes: u64 },
    Downloaded(DownloadOutcome),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub key: String,
    pub size_bytes: Option<u64>,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// One entry per file processed, in selection order. Files after the
    /// budget stop have no entry.
    pub reports: Vec<FileReport>,
    pub folder_bytes: u64,
    pub budget_reached: bool,
}

/// Sequential, budget-bounded downloader over a selection of remote files.
pub struct Downloader {
    client: Client,
    cfg: FetchConfig,
}

impl Downloader {
    pub fn new(cfg: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(cfg.timeout())
            .read_timeout(cfg.timeout())
            .build()
            .context("building HTTP client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: Client, cfg: FetchConfig) -> Self {
        Self { client, cfg }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download `files` in order until the output directory reaches the byte budget.
    ///
    /// Sizes still unknown are probed when the file is reached, so files past
    /// the budget are never touched. The first failed download aborts the run.
    #[instrument(level = "info", skip_all, fields(out_dir = %self.cfg.out_dir.display()))]
    pub async fn run(&self, files: &mut [RemoteFile]) -> Result<RunSummary> {
        let out_dir = &self.cfg.out_dir;
        let target = self.cfg.target_bytes;
        fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let mut summary = RunSummary {
            folder_bytes: folder_bytes(out_dir).await?,
            ..RunSummary::default()
        };
        info!(
            present_gib = %format!("{:.2}", bytes_to_gib(summary.folder_bytes)),
            target_gib = %format!("{:.2}", bytes_to_gib(target)),
            "already present"
        );

        for rf in files.iter_mut() {
            summary.folder_bytes = folder_bytes(out_dir).await?;
            if summary.folder_bytes >= target {
                info!(
                    folder_gib = %format!("{:.2}", bytes_to_gib(summary.folder_bytes)),
                    "budget reached; stopping"
                );
                break;
            }

            if rf.size_bytes.is_none() {
                rf.size_bytes = head_size(&self.client, &rf.url).await;
                match rf.size_bytes {
                    Some(n) => info!(key = %rf.key, gib = %format!("{:.2}", bytes_to_gib(n)), "probed"),
                    None => info!(key = %rf.key, "size unknown (no Content-Length)"),
                }
            }

            let dest = self.cfg.local_path(&rf.key);
            let local = local_size(&dest).await?;
            if let (Some(local), Some(remote)) = (local, rf.size_bytes) {
                if local >= remote {
                    info!(file = rf.file_name(), "skipping (already complete)");
                    summary.reports.push(FileReport {
                        key: rf.key.clone(),
                        size_bytes: rf.size_bytes,
                        status: FileStatus::Skipped { local_bytes: local },
                    });
                    continue;
                }
            }

            info!(file = rf.file_name(), resume_from = local.unwrap_or(0), "downloading");
            let outcome = download_file(&self.client, &rf.url, &dest, self.cfg.chunk_bytes)
                .await
                .with_context(|| format!("downloading {}", rf.key))?;

            summary.folder_bytes = folder_bytes(out_dir).await?;
            info!(
                file = rf.file_name(),
                file_gib = %format!("{:.2}", bytes_to_gib(outcome.bytes)),
                folder_gib = %format!("{:.2}", bytes_to_gib(summary.folder_bytes)),
                secs = %format!("{:.1}", outcome.elapsed.as_secs_f64()),
                "done"
            );
            debug!(?outcome, "download outcome");
            summary.reports.push(FileReport {
                key: rf.key.clone(),
                size_bytes: rf.size_bytes,
                status: FileStatus::Downloaded(outcome),
            });
        }

        summary.budget_reached = summary.folder_bytes >= target;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn key(year: i32) -> String {
        format!("amazon_reviews/amazon_reviews_{}.snappy.parquet", year)
    }

    fn remote(server: &MockServer, year: i32, size: Option<u64>) -> RemoteFile {
        RemoteFile {
            key: key(year),
            url: format!("{}/{}", server.uri(), key(year)),
            year: Some(year),
            size_bytes: size,
        }
    }

    fn setup(target_bytes: u64) -> (TempDir, FetchConfig) {
        let dir = tempdir().unwrap();
        let cfg = FetchConfig {
            out_dir: dir.path().to_path_buf(),
            target_bytes,
            chunk_bytes: 16,
            ..FetchConfig::default()
        };
        (dir, cfg)
    }

    fn local(cfg: &FetchConfig, year: i32) -> PathBuf {
        cfg.local_path(&key(year))
    }

    #[tokio::test]
    async fn complete_local_file_is_never_fetched() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(path(format!("/{}", key(2010))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body(100)))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(u64::MAX);
        std::fs::write(local(&cfg, 2010), body(100))?;

        let mut files = vec![remote(&server, 2010, Some(100))];
        let summary = Downloader::with_client(Client::new(), cfg).run(&mut files).await?;

        assert_eq!(
            summary.reports[0].status,
            FileStatus::Skipped { local_bytes: 100 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn resumed_download_matches_full_fetch() -> Result<()> {
        let full = body(100);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", key(2011))))
            .and(header("range", "bytes=40-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(full[40..].to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(u64::MAX);
        std::fs::write(local(&cfg, 2011), &full[..40])?;

        let mut files = vec![remote(&server, 2011, Some(100))];
        let summary = Downloader::with_client(Client::new(), cfg.clone())
            .run(&mut files)
            .await?;

        assert_eq!(std::fs::read(local(&cfg, 2011))?, full);
        match &summary.reports[0].status {
            FileStatus::Downloaded(o) => {
                assert_eq!(o.bytes, 100);
                assert_eq!(o.resumed_from, 40);
                assert!(!o.restarted);
            }
            other => panic!("expected download, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn ignored_range_truncates_and_overwrites() -> Result<()> {
        let full = body(64);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(full.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let dest = dir.path().join("amazon_reviews_2012.snappy.parquet");
        // stale bytes that do not match the object
        std::fs::write(&dest, vec![0xFFu8; 30])?;

        let url = format!("{}/{}", server.uri(), key(2012));
        let outcome = download_file(&Client::new(), &url, &dest, 8).await?;

        assert!(outcome.restarted);
        assert_eq!(outcome.resumed_from, 0);
        assert_eq!(outcome.bytes, 64);
        assert_eq!(std::fs::read(&dest)?, full);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_size_always_attempts_fetch() -> Result<()> {
        let full = body(50);
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("range", "bytes=50-"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(full.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(u64::MAX);
        std::fs::write(local(&cfg, 2013), &full)?;

        let mut files = vec![remote(&server, 2013, None)];
        let summary = Downloader::with_client(Client::new(), cfg.clone())
            .run(&mut files)
            .await?;

        assert_eq!(files[0].size_bytes, None);
        assert!(matches!(summary.reports[0].status, FileStatus::Downloaded(_)));
        assert_eq!(std::fs::read(local(&cfg, 2013))?, full);
        Ok(())
    }

    #[tokio::test]
    async fn stops_once_folder_meets_budget() -> Result<()> {
        let server = MockServer::start().await;
        for year in [2010, 2011] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", key(year))))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body(6)))
                .expect(1)
                .mount(&server)
                .await;
        }
        // the third file must be neither probed nor fetched
        Mock::given(path(format!("/{}", key(2012))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body(6)))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(10);
        let mut files = vec![
            remote(&server, 2010, None),
            remote(&server, 2011, None),
            remote(&server, 2012, None),
        ];
        let summary = Downloader::with_client(Client::new(), cfg).run(&mut files).await?;

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.folder_bytes, 12);
        assert!(summary.budget_reached);
        Ok(())
    }

    #[tokio::test]
    async fn leftover_files_count_toward_budget() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body(6)))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(10);
        // state left by some earlier run; unrelated file types are ignored
        std::fs::write(cfg.out_dir.join("amazon_reviews_2000s.snappy.parquet"), body(11))?;
        std::fs::write(cfg.out_dir.join("notes.txt"), body(1000))?;

        let mut files = vec![remote(&server, 2010, Some(6))];
        let summary = Downloader::with_client(Client::new(), cfg).run(&mut files).await?;
        assert!(summary.reports.is_empty());
        assert_eq!(summary.folder_bytes, 11);
        Ok(())
    }

    #[tokio::test]
    async fn http_failure_aborts_the_run() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", key(2010))))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", key(2011))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body(6)))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, cfg) = setup(u64::MAX);
        let mut files = vec![remote(&server, 2010, Some(6)), remote(&server, 2011, Some(6))];
        let err = Downloader::with_client(Client::new(), cfg)
            .run(&mut files)
            .await
            .unwrap_err();

        match err.downcast_ref::<ScrapeError>() {
            Some(ScrapeError::Status { status, .. }) => assert_eq!(status.as_u16(), 500),
            other => panic!("expected status error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn folder_bytes_of_missing_dir_is_zero() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(folder_bytes(&dir.path().join("nope")).await?, 0);
        Ok(())
    }
}

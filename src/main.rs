use anyhow::Result;
use clap::Parser;
use reviewscraper::{
    config::{bytes_to_gib, load_config},
    fetch::{self, Downloader, FileStatus, HttpListing},
};
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Download yearly review files up to a byte budget")]
struct Args {
    /// TOML file layered over the defaults; REVIEWS_* env vars override both.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print what the bucket offers and exit without downloading.
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let cfg = load_config(args.config.as_deref())?;
    info!(
        base = %cfg.base_url,
        out_dir = %cfg.out_dir.display(),
        target_gib = %format!("{:.2}", bytes_to_gib(cfg.target_bytes)),
        years = ?cfg.target_years,
        "startup"
    );

    let downloader = Downloader::new(cfg.clone())?;

    // ─── 2) listing only ─────────────────────────────────────────────
    if args.list {
        let listing = HttpListing::new(downloader.client().clone(), cfg.base_url.clone());
        let index = fetch::index_listing(&listing, &cfg).await?;
        println!("years:   {:?}", index.by_year.keys().collect::<Vec<_>>());
        for key in &index.decades {
            println!("decade:  {}", key);
        }
        for key in &index.others {
            println!("other:   {}", key);
        }
        return Ok(());
    }

    // ─── 3) download until the budget is met ─────────────────────────
    let start = Instant::now();
    let summary = fetch::acquire(&downloader, &cfg).await?;

    let fetched: u64 = summary
        .reports
        .iter()
        .filter_map(|r| match &r.status {
            FileStatus::Downloaded(o) => Some(o.bytes),
            FileStatus::Skipped { .. } => None,
        })
        .sum();
    let skipped = summary
        .reports
        .iter()
        .filter(|r| matches!(r.status, FileStatus::Skipped { .. }))
        .count();

    println!(
        "Total downloaded: {:.2} GiB in {} ({} files fetched, {} already complete, {:.2} GiB this run, {:.1}s)",
        bytes_to_gib(summary.folder_bytes),
        cfg.out_dir.display(),
        summary.reports.len() - skipped,
        skipped,
        bytes_to_gib(fetched),
        start.elapsed().as_secs_f64(),
    );
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use reviewscraper::{
    clean::{sample::DEFAULT_ROWS_PER_FILE, sample_reviews, SampleOptions},
    duck::Engine,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Take a fixed-size deterministic sample from each review file")]
struct Args {
    #[arg(long)]
    data_dir: PathBuf,
    /// Rows per input file.
    #[arg(long, default_value_t = DEFAULT_ROWS_PER_FILE)]
    n: u64,
    #[arg(long, default_value = "combined_sample.parquet")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let opts = SampleOptions {
        data_dir: args.data_dir,
        rows_per_file: args.n,
        out: args.out,
    };

    let engine = Engine::open_in_memory()?;
    let report = sample_reviews(&engine, &opts)?;

    for (file, rows) in &report.per_file {
        println!("{:>8}  {}", rows, file);
    }
    println!(
        "Wrote {} ({} rows from {} files)",
        opts.out.display(),
        report.rows_written,
        report.input_files
    );
    Ok(())
}

use anyhow::Result;
use clap::{Parser, ValueEnum};
use reviewscraper::{
    clean::{merge_clean, BlankPolicy, MergeOptions},
    duck::Engine,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Always drop blank category and body.
    Strict,
    /// Drop blanks only where a --drop-blank-* flag asks for it.
    Flagged,
}

#[derive(Parser)]
#[command(author, version, about = "Merge yearly review files into one cleaned Parquet file")]
struct Args {
    #[arg(long)]
    data_dir: PathBuf,
    #[arg(long, default_value = "merged_clean.parquet")]
    out: PathBuf,
    #[arg(long, value_enum, default_value = "strict")]
    blank_policy: PolicyArg,
    #[arg(long)]
    drop_blank_category: bool,
    #[arg(long)]
    drop_blank_body: bool,
}

impl Args {
    fn policy(&self) -> BlankPolicy {
        match self.blank_policy {
            PolicyArg::Strict => BlankPolicy::Strict,
            PolicyArg::Flagged => BlankPolicy::Flagged {
                category: self.drop_blank_category,
                body: self.drop_blank_body,
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let opts = MergeOptions {
        data_dir: args.data_dir.clone(),
        out: args.out.clone(),
        blank_policy: args.policy(),
    };
    if matches!(opts.blank_policy, BlankPolicy::Strict)
        && (args.drop_blank_category || args.drop_blank_body)
    {
        info!("strict policy already drops blank text; --drop-blank-* flags have no effect");
    }

    let engine = Engine::open_in_memory()?;
    let report = merge_clean(&engine, &opts)?;

    println!(
        "Wrote {} ({} rows from {} files)",
        opts.out.display(),
        report.rows_written,
        report.input_files
    );
    Ok(())
}

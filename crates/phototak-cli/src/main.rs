use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phototak", version, about = "Archive exported photos into Y<year>/M<month> folders by capture date")]
struct Cli {
    /// Directory to search for exported photos
    #[arg(short, long, default_value = ".")]
    source: PathBuf,

    /// Archive root; Y<year>/M<month> directories are created underneath
    #[arg(short, long)]
    target: PathBuf,

    /// Append the run log to this file
    #[arg(long, default_value = "phototak.log")]
    log_file: PathBuf,

    /// Leave PNG/HEIC photos alone instead of converting them to JPEG
    #[arg(long)]
    no_convert: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("cannot open log file {}", cli.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    eprintln!("phototak: {} -> {}", cli.source.display(), cli.target.display());

    let options = phototak_core::Options {
        source: cli.source,
        target: cli.target,
        convert: !cli.no_convert,
    };
    let summary = phototak_core::run(&options)?;

    eprintln!(
        "Done! {} photos found, {} archived, {} converted, {} without timestamp, {} failed, {} orphan sidecars, {} skipped ({:.2}s)",
        summary.candidates,
        summary.placed,
        summary.converted,
        summary.unresolved,
        summary.failed,
        summary.orphan_sidecars,
        summary.skipped,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}

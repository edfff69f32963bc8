pub mod convert;
pub mod date;
pub mod error;
pub mod media;
pub mod place;
pub mod scan;

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};

pub use error::{Error, Result};

use media::MediaKind;
use place::Placer;

/// Where to read the export from and where the archive lives.
#[derive(Debug, Clone)]
pub struct Options {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Transcode PNG/HEIC inputs to JPEG before archiving.
    pub convert: bool,
}

/// Per-run accounting.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Photos found by the scan
    pub candidates: u64,
    /// Photos moved into the archive
    pub placed: u64,
    /// Photos transcoded to JPEG on the way
    pub converted: u64,
    /// Photos with no timestamp from any fallback stage
    pub unresolved: u64,
    /// Photos that hit an I/O or conversion error
    pub failed: u64,
    /// Sidecars with no matching photo
    pub orphan_sidecars: u64,
    /// Files skipped as unsupported or because conversion was disabled
    pub skipped: u64,
}

/// Walk the source tree and archive every photo found, one at a time.
/// A photo that cannot be resolved or placed is logged and left where it
/// is; the run keeps going.
pub fn run(options: &Options) -> Result<RunSummary> {
    if !options.source.is_dir() {
        return Err(Error::SourceMissing {
            path: options.source.clone(),
        });
    }
    fs::create_dir_all(&options.target).map_err(|source| Error::CreateDir {
        path: options.target.clone(),
        source,
    })?;
    info!(source = %options.source.display(), target = %options.target.display(), "run started");

    let scan = scan::scan_source(&options.source)?;
    let mut summary = RunSummary {
        candidates: scan.candidates.len() as u64,
        orphan_sidecars: scan.orphan_sidecars,
        skipped: scan.skipped_unsupported,
        ..RunSummary::default()
    };

    let mut placer = Placer::new(&options.target);
    let pb = ProgressBar::new(scan.candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} archiving photos")
            .unwrap(),
    );

    for candidate in scan.candidates {
        let path = match candidate.kind {
            MediaKind::Jpeg => candidate.path,
            MediaKind::Convertible if options.convert => {
                match convert::to_jpeg(&candidate.path) {
                    Ok(path) => {
                        summary.converted += 1;
                        path
                    }
                    Err(err) => {
                        error!(path = %candidate.path.display(), error = %err, "conversion failed");
                        summary.failed += 1;
                        pb.inc(1);
                        continue;
                    }
                }
            }
            MediaKind::Convertible => {
                debug!(path = %candidate.path.display(), "conversion disabled, skipping");
                summary.skipped += 1;
                pb.inc(1);
                continue;
            }
        };

        match archive_one(&mut placer, &path) {
            Ok(_) => summary.placed += 1,
            Err(Error::NoTimestamp { .. }) => summary.unresolved += 1,
            Err(err) => {
                error!(path = %path.display(), error = %err, "could not archive");
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(?summary, "run finished");
    Ok(summary)
}

/// Resolve then place a single photo.
fn archive_one(placer: &mut Placer, path: &Path) -> Result<PathBuf> {
    let resolved = date::resolve(path)?;
    placer.place(path, &resolved.capture)
}

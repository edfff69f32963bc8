use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::date::sidecar;
use crate::error::Result;
use crate::media::{self, Candidate};

/// Outcome of walking the source tree.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Photos to process, in deterministic walk order
    pub candidates: Vec<Candidate>,
    /// Sidecars with no matching photo at either naming convention
    pub orphan_sidecars: u64,
    /// Image files in formats the pipeline does not handle
    pub skipped_unsupported: u64,
}

/// Walk `root` and classify every regular file.
pub fn scan_source(root: &Path) -> Result<ScanResult> {
    let mut result = ScanResult::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();

        if path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
        {
            check_sidecar(&path, &mut result);
            continue;
        }

        match media::classify(&path) {
            Some(kind) => result.candidates.push(Candidate::new(path, kind)),
            None => {
                let is_image = mime_guess::from_path(&path)
                    .first()
                    .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE);
                if is_image {
                    warn!(path = %path.display(), "unsupported image format, skipping");
                    result.skipped_unsupported += 1;
                } else {
                    debug!(path = %path.display(), "ignoring non-image file");
                }
            }
        }
    }

    Ok(result)
}

/// A sidecar is accounted for when its photo exists at the standard
/// location or at the misnamed location the resolver knows how to repair.
fn check_sidecar(path: &Path, result: &mut ScanResult) {
    if let Some(owner) = standard_owner(path) {
        if owner.exists() {
            return;
        }
    }
    if let Some(owner) = sidecar::quirk_owner(path) {
        if owner.exists() {
            return;
        }
    }
    warn!(path = %path.display(), "orphan sidecar with no matching photo");
    result.orphan_sidecars += 1;
}

/// `IMG_0007.jpg.json` -> `IMG_0007.jpg`.
fn standard_owner(sidecar: &Path) -> Option<PathBuf> {
    let name = sidecar.file_name()?.to_str()?;
    let owner = name.strip_suffix(".json")?;
    if owner.is_empty() {
        return None;
    }
    Some(sidecar.with_file_name(owner))
}

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::date::{sidecar, CaptureTime};
use crate::error::{Error, Result};

/// Collision-ladder sanity bound; past this the input set is pathological.
const SEQUENCE_LIMIT: u32 = 1_000_000;

/// Trailing sequence marker from an earlier ladder rung: `...x12`.
static SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"x\d+$").unwrap());

/// Moves resolved photos into the date-partitioned archive, never
/// overwriting an existing file.
#[derive(Debug)]
pub struct Placer {
    root: PathBuf,
    created_dirs: HashSet<PathBuf>,
}

impl Placer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            created_dirs: HashSet::new(),
        }
    }

    /// Place one photo: compute the canonical destination, walk the
    /// collision ladder until a free name is found, move the file, restore
    /// its mtime and drop the now-superseded sidecar.
    pub fn place(&mut self, photo: &Path, capture: &CaptureTime) -> Result<PathBuf> {
        let dir = self.root.join(capture.year_dir()).join(capture.month_dir());
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir).map_err(|source| Error::CreateDir {
                path: dir.clone(),
                source,
            })?;
            self.created_dirs.insert(dir.clone());
        }

        let ext = photo
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());

        let dest = free_destination(&dir, capture, &ext)?;
        move_file(photo, &dest)?;
        info!(from = %photo.display(), to = %dest.display(), "archived");

        let ft = filetime::FileTime::from_unix_time(capture.unix_seconds(), 0);
        filetime::set_file_mtime(&dest, ft).ok();

        let sidecar_path = sidecar::sidecar_path(photo);
        if sidecar_path.exists() {
            match fs::remove_file(&sidecar_path) {
                Ok(()) => info!(path = %sidecar_path.display(), "removed superseded sidecar"),
                Err(err) => {
                    warn!(path = %sidecar_path.display(), error = %err, "could not remove sidecar")
                }
            }
        }

        Ok(dest)
    }
}

/// The collision ladder: canonical minute name, then seconds, then the
/// sub-second fraction, then a sequence marker. Every rung re-checks the
/// filesystem before accepting a name.
fn free_destination(dir: &Path, capture: &CaptureTime, ext: &str) -> Result<PathBuf> {
    let mut stem = format!("P{}", capture.minute_stamp());
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return Ok(candidate);
    }

    info!(path = %candidate.display(), "destination taken, appending seconds");
    stem.push_str(&capture.seconds());
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return Ok(candidate);
    }

    match capture.subsec() {
        Some(subsec) => {
            info!(path = %candidate.display(), subsec, "still taken, appending sub-second");
            stem.push_str(subsec);
            let candidate = dir.join(format!("{stem}.{ext}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        None => info!(path = %candidate.display(), "still taken and no sub-second available"),
    }

    // The counter restarts at every placement; stripping an earlier marker
    // first means retries replace it instead of stacking.
    let base = dir.join(format!("{stem}.{ext}"));
    for counter in 0..SEQUENCE_LIMIT {
        let trimmed = SEQUENCE_RE.replace(&stem, "");
        stem = format!("{trimmed}x{counter}");
        let candidate = dir.join(format!("{stem}.{ext}"));
        if !candidate.exists() {
            info!(path = %candidate.display(), "made unique with sequence marker");
            return Ok(candidate);
        }
    }
    Err(Error::SequenceOverflow {
        base,
        limit: SEQUENCE_LIMIT,
    })
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    let move_err = |source: io::Error| Error::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if !try_atomic_move(from, to).map_err(&move_err)? {
        fs::copy(from, to).map_err(&move_err)?;
        fs::remove_file(from).map_err(&move_err)?;
    }
    Ok(())
}

/// Attempts to move the file atomically (rename). `Ok(false)` means the
/// rename failed with EXDEV and a copy fallback is needed.
fn try_atomic_move(from: &Path, to: &Path) -> io::Result<bool> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) => {
            // Cross-filesystem moves fail with EXDEV (18 on Linux)
            if e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                Ok(false)
            } else {
                Err(e)
            }
        }
    }
}

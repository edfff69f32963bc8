use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;

/// Trailing parenthesized disambiguator in a file stem: `IMG_0007(3)`.
static DISAMBIGUATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*)\((?P<n>\d+)\)$").unwrap());

/// Sidecar name produced by the export quirk: `IMG_0007.jpg(3).json`.
static MISNAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)\.(?P<ext>[A-Za-z0-9]+)\((?P<n>\d+)\)\.json$").unwrap()
});

#[derive(Debug, Deserialize)]
struct SidecarDoc {
    #[serde(rename = "photoTakenTime")]
    photo_taken_time: Option<TakenTime>,
}

#[derive(Debug, Deserialize)]
struct TakenTime {
    timestamp: Option<Epoch>,
}

/// Exporters write the epoch either as a decimal string or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Epoch {
    Text(String),
    Number(i64),
}

impl Epoch {
    fn seconds(&self) -> Option<i64> {
        match self {
            Epoch::Text(s) => s.trim().parse().ok(),
            Epoch::Number(n) => Some(*n),
        }
    }
}

/// Standard sidecar convention: the photo's full name plus `.json`.
pub fn sidecar_path(photo: &Path) -> PathBuf {
    let mut name = photo.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// Where the export quirk would have written the sidecar: the extension
/// migrates in front of the parenthesized disambiguator, so `IMG(3).jpg`
/// gets `IMG.jpg(3).json` instead of `IMG(3).jpg.json`.
pub fn quirk_sidecar_path(photo: &Path) -> Option<PathBuf> {
    let stem = photo.file_stem()?.to_str()?;
    let ext = photo.extension()?.to_str()?;
    let caps = DISAMBIGUATOR_RE.captures(stem)?;
    let name = format!("{}.{}({}).json", &caps["base"], ext, &caps["n"]);
    Some(photo.with_file_name(name))
}

/// Inverse quirk lookup: the photo a misnamed sidecar belongs to, if the
/// name matches the quirk shape.
pub fn quirk_owner(sidecar: &Path) -> Option<PathBuf> {
    let name = sidecar.file_name()?.to_str()?;
    let caps = MISNAMED_RE.captures(name)?;
    let owner = format!("{}({}).{}", &caps["base"], &caps["n"], &caps["ext"]);
    Some(sidecar.with_file_name(owner))
}

/// One-time repair for the quirk: rename the misplaced sidecar to the
/// standard convention so the normal lookup can read it. Returns whether a
/// rename happened.
pub fn repair_misnamed(photo: &Path) -> Result<bool> {
    let Some(misnamed) = quirk_sidecar_path(photo) else {
        return Ok(false);
    };
    if !misnamed.exists() {
        return Ok(false);
    }
    let standard = sidecar_path(photo);
    if standard.exists() {
        return Ok(false);
    }
    fs::rename(&misnamed, &standard)?;
    info!(from = %misnamed.display(), to = %standard.display(), "renamed misplaced sidecar");
    Ok(true)
}

/// Pull the capture-time epoch out of a sidecar document. `None` for a
/// malformed document or a missing field.
pub fn parse_taken_time(bytes: &[u8]) -> Option<i64> {
    let doc: SidecarDoc = serde_json::from_slice(bytes).ok()?;
    doc.photo_taken_time?.timestamp?.seconds()
}

/// Read and parse the sidecar at `path`. I/O failure propagates; a document
/// without the field reads as `None`.
pub fn read_taken_time(path: &Path) -> Result<Option<i64>> {
    let bytes = fs::read(path)?;
    let epoch = parse_taken_time(&bytes);
    if epoch.is_none() {
        warn!(path = %path.display(), "sidecar carries no usable capture time");
    }
    Ok(epoch)
}

pub mod exif;
pub mod sidecar;

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDateTime};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Wall-clock capture time plus the optional sub-second fraction paired
/// with the embedded original timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTime {
    datetime: NaiveDateTime,
    subsec: Option<String>,
}

impl CaptureTime {
    /// Build from an already-parsed datetime. Returns `None` for
    /// non-positive years, which the archive layout cannot represent.
    pub fn new(datetime: NaiveDateTime, subsec: Option<String>) -> Option<Self> {
        if datetime.year() <= 0 {
            return None;
        }
        Some(Self { datetime, subsec })
    }

    /// Convert a sidecar epoch (seconds, UTC). Epoch 0 is the exporter's
    /// "capture time unknown" sentinel and is rejected like a zeroed year.
    pub fn from_epoch(epoch: i64) -> Option<Self> {
        if epoch == 0 {
            return None;
        }
        let utc = DateTime::from_timestamp(epoch, 0)?;
        Self::new(utc.naive_utc(), None)
    }

    pub fn subsec(&self) -> Option<&str> {
        self.subsec.as_deref()
    }

    /// Archive year directory name: `Y2021`.
    pub fn year_dir(&self) -> String {
        format!("Y{}", self.datetime.format("%Y"))
    }

    /// Archive month directory name: `M09`.
    pub fn month_dir(&self) -> String {
        format!("M{}", self.datetime.format("%m"))
    }

    /// Minute-precision stamp used in the canonical file name: `202109181427`.
    pub fn minute_stamp(&self) -> String {
        self.datetime.format("%Y%m%d%H%M").to_string()
    }

    /// Zero-padded seconds, the first collision refinement.
    pub fn seconds(&self) -> String {
        self.datetime.format("%S").to_string()
    }

    /// Unix timestamp, for restoring file mtimes after a move.
    pub fn unix_seconds(&self) -> i64 {
        self.datetime.and_utc().timestamp()
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(subsec) = &self.subsec {
            write!(f, ".{subsec}")?;
        }
        Ok(())
    }
}

/// Which fallback stage produced the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Embedded original field, when the shutter fired.
    ExifOriginal,
    /// Embedded generic field, consulted when the original is absent or zeroed.
    ExifGeneric,
    /// Sidecar capture-time epoch.
    Sidecar,
}

/// A resolved timestamp and the stage that supplied it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub capture: CaptureTime,
    pub source: TimeSource,
}

/// Resolve the capture timestamp for one photo, in priority order.
pub fn resolve(photo: &Path) -> Result<Resolved> {
    // 1. Embedded metadata: original field first, generic as fallback.
    if let Some(fields) = exif::read_fields(photo)? {
        if let Some((capture, source)) = exif::embedded_capture(&fields) {
            info!(path = %photo.display(), %capture, ?source, "timestamp from embedded metadata");
            return Ok(Resolved { capture, source });
        }
        debug!(path = %photo.display(), "embedded metadata has no usable timestamp");
    }

    // 2. Sidecar document, repairing the misnamed-export quirk if needed.
    let sidecar_path = sidecar::sidecar_path(photo);
    if !sidecar_path.exists() && !sidecar::repair_misnamed(photo)? {
        error!(path = %photo.display(), "no embedded timestamp and no sidecar");
        return Err(Error::NoTimestamp {
            path: photo.to_path_buf(),
        });
    }

    let Some(epoch) = sidecar::read_taken_time(&sidecar_path)? else {
        error!(path = %photo.display(), sidecar = %sidecar_path.display(), "sidecar has no capture time");
        return Err(Error::NoTimestamp {
            path: photo.to_path_buf(),
        });
    };

    let Some(capture) = CaptureTime::from_epoch(epoch) else {
        error!(path = %photo.display(), epoch, "sidecar capture time is zero or out of range");
        return Err(Error::NoTimestamp {
            path: photo.to_path_buf(),
        });
    };

    info!(path = %photo.display(), %capture, "timestamp from sidecar");
    Ok(Resolved {
        capture,
        source: TimeSource::Sidecar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn epoch(secs: i64) -> CaptureTime {
        CaptureTime::from_epoch(secs).unwrap()
    }

    #[test]
    fn epoch_zero_is_rejected() {
        assert!(CaptureTime::from_epoch(0).is_none());
    }

    #[test]
    fn epoch_last_second_of_1999() {
        let capture = epoch(946_684_799);
        assert_eq!(capture.year_dir(), "Y1999");
        assert_eq!(capture.month_dir(), "M12");
        assert_eq!(capture.minute_stamp(), "199912312359");
        assert_eq!(capture.seconds(), "59");
    }

    #[test]
    fn epoch_first_second_of_2000() {
        let capture = epoch(946_684_800);
        assert_eq!(capture.year_dir(), "Y2000");
        assert_eq!(capture.month_dir(), "M01");
        assert_eq!(capture.minute_stamp(), "200001010000");
        assert_eq!(capture.seconds(), "00");
    }

    #[test]
    fn epoch_round_trips_to_unix_seconds() {
        assert_eq!(epoch(1_631_975_225).unix_seconds(), 1_631_975_225);
    }

    #[test]
    fn year_zero_is_rejected() {
        let dt = chrono::NaiveDate::from_ymd_opt(0, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(CaptureTime::new(dt, None).is_none());
    }

    #[test]
    fn display_includes_subsec_when_present() {
        let dt = chrono::NaiveDate::from_ymd_opt(2021, 9, 18)
            .unwrap()
            .and_hms_opt(14, 27, 5)
            .unwrap();
        let capture = CaptureTime::new(dt, Some("042".to_string())).unwrap();
        assert_eq!(capture.to_string(), "2021-09-18 14:27:05.042");
        let plain = CaptureTime::new(dt, None).unwrap();
        assert_eq!(plain.to_string(), "2021-09-18 14:27:05");
    }

    #[test]
    fn resolve_prefers_embedded_original_over_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("a.jpg");
        fs::write(
            &photo,
            exif::test_jpeg(Some("2021:09:18 14:27:05"), Some("042"), None),
        )
        .unwrap();
        fs::write(
            dir.path().join("a.jpg.json"),
            r#"{"photoTakenTime":{"timestamp":"946684800"}}"#,
        )
        .unwrap();

        let resolved = resolve(&photo).unwrap();
        assert_eq!(resolved.source, TimeSource::ExifOriginal);
        assert_eq!(resolved.capture.minute_stamp(), "202109181427");
        assert_eq!(resolved.capture.subsec(), Some("042"));
        // The sidecar is left alone for the placement stage to clean up.
        assert!(dir.path().join("a.jpg.json").exists());
    }

    #[test]
    fn resolve_falls_back_to_generic_when_original_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("b.jpg");
        fs::write(
            &photo,
            exif::test_jpeg(
                Some("0000:00:00 00:00:00"),
                None,
                Some("2019:03:02 08:00:59"),
            ),
        )
        .unwrap();

        let resolved = resolve(&photo).unwrap();
        assert_eq!(resolved.source, TimeSource::ExifGeneric);
        assert_eq!(resolved.capture.minute_stamp(), "201903020800");
        assert_eq!(resolved.capture.subsec(), None);
    }

    #[test]
    fn resolve_uses_sidecar_when_both_embedded_fields_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("c.jpg");
        fs::write(
            &photo,
            exif::test_jpeg(
                Some("0000:00:00 00:00:00"),
                None,
                Some("0000:00:00 00:00:00"),
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("c.jpg.json"),
            r#"{"photoTakenTime":{"timestamp":946684800}}"#,
        )
        .unwrap();

        let resolved = resolve(&photo).unwrap();
        assert_eq!(resolved.source, TimeSource::Sidecar);
        assert_eq!(resolved.capture.minute_stamp(), "200001010000");
    }

    #[test]
    fn resolve_reads_sidecar_for_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("d.jpg");
        fs::write(&photo, b"not really a jpeg").unwrap();
        fs::write(
            dir.path().join("d.jpg.json"),
            r#"{"photoTakenTime":{"timestamp":"1631975225"}}"#,
        )
        .unwrap();

        let resolved = resolve(&photo).unwrap();
        assert_eq!(resolved.source, TimeSource::Sidecar);
        assert_eq!(resolved.capture.unix_seconds(), 1_631_975_225);
    }

    #[test]
    fn resolve_repairs_misnamed_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("img(2).jpg");
        fs::write(&photo, b"bytes").unwrap();
        fs::write(
            dir.path().join("img.jpg(2).json"),
            r#"{"photoTakenTime":{"timestamp":"1631975225"}}"#,
        )
        .unwrap();

        let resolved = resolve(&photo).unwrap();
        assert_eq!(resolved.source, TimeSource::Sidecar);
        assert!(dir.path().join("img(2).jpg.json").exists());
        assert!(!dir.path().join("img.jpg(2).json").exists());
    }

    #[test]
    fn resolve_ignores_quirk_sidecar_for_unmarked_names() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("e.jpg");
        fs::write(&photo, b"bytes").unwrap();
        // looks misnamed, but e.jpg has no trailing marker so it is not ours
        fs::write(
            dir.path().join("e.jpg(2).json"),
            r#"{"photoTakenTime":{"timestamp":"1631975225"}}"#,
        )
        .unwrap();

        assert!(matches!(
            resolve(&photo),
            Err(Error::NoTimestamp { .. })
        ));
        assert!(dir.path().join("e.jpg(2).json").exists());
    }

    #[test]
    fn resolve_fails_without_any_source() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("f.jpg");
        fs::write(&photo, b"bytes").unwrap();

        match resolve(&photo) {
            Err(Error::NoTimestamp { path }) => assert_eq!(path, photo),
            other => panic!("expected NoTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn resolve_fails_on_zero_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("f.jpg");
        fs::write(&photo, b"bytes").unwrap();
        fs::write(
            dir.path().join("f.jpg.json"),
            r#"{"photoTakenTime":{"timestamp":"0"}}"#,
        )
        .unwrap();

        assert!(matches!(
            resolve(&photo),
            Err(Error::NoTimestamp { .. })
        ));
        // a failed resolution never consumes the sidecar
        assert!(dir.path().join("f.jpg.json").exists());
    }

    #[test]
    fn resolve_fails_on_malformed_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("g.jpg");
        fs::write(&photo, b"bytes").unwrap();
        fs::write(dir.path().join("g.jpg.json"), b"{not json").unwrap();

        assert!(matches!(
            resolve(&photo),
            Err(Error::NoTimestamp { .. })
        ));
    }
}

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{info, warn};

use crate::date::sidecar;
use crate::error::{Error, Result};

/// Matches the exporter's own "best quality" re-encode.
const JPEG_QUALITY: u8 = 100;

/// Transcode a PNG or HEIC photo to a JPEG with the same stem, taking the
/// sidecar along and removing the source container. Never overwrites an
/// existing JPEG neighbour.
pub fn to_jpeg(path: &Path) -> Result<PathBuf> {
    let dest = path.with_extension("jpg");
    if dest.exists() {
        return Err(Error::Convert {
            path: path.to_path_buf(),
            message: format!("{} already exists", dest.display()),
        });
    }

    let rgb = image::open(path)
        .map_err(|err| Error::Convert {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?
        .to_rgb8();

    if let Err(err) = write_jpeg(&rgb, path, &dest) {
        let _ = fs::remove_file(&dest);
        return Err(err);
    }
    info!(from = %path.display(), to = %dest.display(), "converted to JPEG");

    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove converted source");
    }

    let old_sidecar = sidecar::sidecar_path(path);
    if old_sidecar.exists() {
        let new_sidecar = sidecar::sidecar_path(&dest);
        match fs::rename(&old_sidecar, &new_sidecar) {
            Ok(()) => info!(path = %new_sidecar.display(), "sidecar renamed with its photo"),
            Err(err) => {
                warn!(path = %old_sidecar.display(), error = %err, "could not rename sidecar")
            }
        }
    }

    Ok(dest)
}

fn write_jpeg(rgb: &RgbImage, source: &Path, dest: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(dest)?);
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))
        .map_err(|err| Error::Convert {
            path: source.to_path_buf(),
            message: err.to_string(),
        })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_converts_and_sidecar_follows() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("shot.png");
        RgbImage::new(4, 4).save(&png).unwrap();
        fs::write(dir.path().join("shot.png.json"), b"{}").unwrap();

        let dest = to_jpeg(&png).unwrap();
        assert_eq!(dest, dir.path().join("shot.jpg"));
        assert!(!png.exists());
        assert!(dir.path().join("shot.jpg.json").exists());
        assert!(!dir.path().join("shot.png.json").exists());

        let reread = image::open(&dest).unwrap();
        assert_eq!(reread.width(), 4);
        assert_eq!(reread.height(), 4);
    }

    #[test]
    fn alpha_channel_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("overlay.png");
        image::RgbaImage::new(2, 2).save(&png).unwrap();

        let dest = to_jpeg(&png).unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn refuses_to_overwrite_existing_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("dup.png");
        RgbImage::new(2, 2).save(&png).unwrap();
        fs::write(dir.path().join("dup.jpg"), b"keep me").unwrap();

        assert!(matches!(to_jpeg(&png), Err(Error::Convert { .. })));
        assert!(png.exists());
        assert_eq!(fs::read(dir.path().join("dup.jpg")).unwrap(), b"keep me");
    }

    #[test]
    fn undecodable_input_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("broken.png");
        fs::write(&png, b"not a png").unwrap();

        assert!(matches!(to_jpeg(&png), Err(Error::Convert { .. })));
        assert!(png.exists());
        assert!(!dir.path().join("broken.jpg").exists());
    }
}

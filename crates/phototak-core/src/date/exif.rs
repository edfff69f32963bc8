use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use tracing::debug;

use super::{CaptureTime, TimeSource};
use crate::error::Result;

/// Raw embedded timestamp fields, exactly as stored in the file.
/// EXIF datetimes have no timezone info - they are local time as-is.
#[derive(Debug, Default, Clone)]
pub struct ExifFields {
    /// DateTimeOriginal: when the shutter fired.
    pub original: Option<String>,
    /// SubSecTimeOriginal: fraction paired with `original`.
    pub original_subsec: Option<String>,
    /// DateTime: generic modification timestamp.
    pub generic: Option<String>,
}

/// Read the timestamp fields from a file's embedded metadata.
/// `Ok(None)` means the file carries no EXIF container at all.
pub fn read_fields(path: &Path) -> Result<Option<ExifFields>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let data = match Reader::new().read_from_container(&mut reader) {
        Ok(data) => data,
        Err(_) => return Ok(None),
    };

    Ok(Some(ExifFields {
        original: ascii_field(&data, Tag::DateTimeOriginal),
        original_subsec: ascii_field(&data, Tag::SubSecTimeOriginal),
        generic: ascii_field(&data, Tag::DateTime),
    }))
}

fn ascii_field(data: &exif::Exif, tag: Tag) -> Option<String> {
    let field = data.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(chunks) => chunks
            .first()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// The embedded stages of the fallback chain. The original field wins and
/// brings its paired sub-second; an absent or zeroed original falls back to
/// the generic field, which never carries one.
pub fn embedded_capture(fields: &ExifFields) -> Option<(CaptureTime, TimeSource)> {
    if let Some(raw) = fields.original.as_deref().filter(|raw| !is_zeroed(raw)) {
        match parse_exif_datetime(raw) {
            Some(dt) => {
                let subsec = fields
                    .original_subsec
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                if let Some(capture) = CaptureTime::new(dt, subsec) {
                    return Some((capture, TimeSource::ExifOriginal));
                }
            }
            None => debug!(value = raw, "unparseable original timestamp field"),
        }
    }

    let raw = fields.generic.as_deref().filter(|raw| !is_zeroed(raw))?;
    match parse_exif_datetime(raw) {
        Some(dt) => CaptureTime::new(dt, None).map(|capture| (capture, TimeSource::ExifGeneric)),
        None => {
            debug!(value = raw, "unparseable generic timestamp field");
            None
        }
    }
}

/// Textual no-timestamp marker: some writers store an all-zero datetime
/// instead of omitting the field.
fn is_zeroed(raw: &str) -> bool {
    raw.starts_with("0000")
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d") {
        return Some(d.and_hms_opt(0, 0, 0)?);
    }

    None
}

/// Minimal JPEG wrapping a little-endian TIFF block with the three
/// timestamp tags, enough for the reader under test.
#[cfg(test)]
pub(crate) fn test_jpeg(
    original: Option<&str>,
    subsec: Option<&str>,
    generic: Option<&str>,
) -> Vec<u8> {
    // ASCII entry: values of four bytes or fewer are stored inline,
    // longer ones go to the data area past both IFDs.
    fn ascii_entry(tag: u16, text: &str, data: &mut Vec<u8>, data_base: usize) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let mut entry = Vec::with_capacity(12);
        entry.extend_from_slice(&tag.to_le_bytes());
        entry.extend_from_slice(&2u16.to_le_bytes());
        entry.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            entry.extend_from_slice(&bytes);
        } else {
            entry.extend_from_slice(&((data_base + data.len()) as u32).to_le_bytes());
            data.extend_from_slice(&bytes);
        }
        entry
    }

    let ifd0_count = 1 + generic.is_some() as usize;
    let exif_count = original.is_some() as usize + subsec.is_some() as usize;
    let exif_offset = 8 + 2 + 12 * ifd0_count + 4;
    let data_base = exif_offset + 2 + 12 * exif_count + 4;

    let mut data = Vec::new();

    let mut ifd0 = Vec::new();
    ifd0.extend_from_slice(&(ifd0_count as u16).to_le_bytes());
    if let Some(generic) = generic {
        ifd0.extend_from_slice(&ascii_entry(0x0132, generic, &mut data, data_base));
    }
    ifd0.extend_from_slice(&0x8769u16.to_le_bytes());
    ifd0.extend_from_slice(&4u16.to_le_bytes());
    ifd0.extend_from_slice(&1u32.to_le_bytes());
    ifd0.extend_from_slice(&(exif_offset as u32).to_le_bytes());
    ifd0.extend_from_slice(&0u32.to_le_bytes());

    let mut exif_ifd = Vec::new();
    exif_ifd.extend_from_slice(&(exif_count as u16).to_le_bytes());
    if let Some(original) = original {
        exif_ifd.extend_from_slice(&ascii_entry(0x9003, original, &mut data, data_base));
    }
    if let Some(subsec) = subsec {
        exif_ifd.extend_from_slice(&ascii_entry(0x9291, subsec, &mut data, data_base));
    }
    exif_ifd.extend_from_slice(&0u32.to_le_bytes());

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(b"II");
    payload.extend_from_slice(&42u16.to_le_bytes());
    payload.extend_from_slice(&8u32.to_le_bytes());
    payload.extend_from_slice(&ifd0);
    payload.extend_from_slice(&exif_ifd);
    payload.extend_from_slice(&data);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&payload);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

use std::path::{Path, PathBuf};

/// How the scanner classified a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Standard container, archived directly.
    Jpeg,
    /// PNG or HEIC, transcoded to JPEG before archiving.
    Convertible,
}

/// One photo under consideration for archiving.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Absolute or source-relative path as found by the walk
    pub path: PathBuf,
    /// Container classification
    pub kind: MediaKind,
}

impl Candidate {
    pub fn new(path: PathBuf, kind: MediaKind) -> Self {
        Self { path, kind }
    }
}

/// Classify by extension. `None` for anything the pipeline does not handle.
pub fn classify(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
        Some(MediaKind::Jpeg)
    } else if ext.eq_ignore_ascii_case("png") || ext.eq_ignore_ascii_case("heic") {
        Some(MediaKind::Convertible)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify(Path::new("a.jpg")), Some(MediaKind::Jpeg));
        assert_eq!(classify(Path::new("a.JPEG")), Some(MediaKind::Jpeg));
        assert_eq!(classify(Path::new("a.png")), Some(MediaKind::Convertible));
        assert_eq!(classify(Path::new("a.HEIC")), Some(MediaKind::Convertible));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(classify(Path::new("a.gif")), None);
        assert_eq!(classify(Path::new("a.txt")), None);
        assert_eq!(classify(Path::new("noext")), None);
    }
}

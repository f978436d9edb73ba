//! Local checks on the selected files.
//!
//! Nothing here touches the network: a selection that fails validation never
//! reaches [`crate::upload::UploadManager`].

use crate::error::{DiffClientError, ValidationError, MAX_FILE_SIZE_BYTES};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PDF_MIME: &str = "application/pdf";

/// A file the user picked, before any upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    /// Detected MIME type; empty when unknown.
    pub mime_type: String,
}

impl FileCandidate {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Stat a local file and sniff its type from the `%PDF` magic bytes.
    ///
    /// A file that exists but is not a PDF still yields a candidate (with an
    /// empty MIME type) so that validation, not I/O, reports the problem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DiffClientError> {
        let path = path.as_ref().to_path_buf();

        let mut file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(DiffClientError::PermissionDenied { path });
            }
            Err(_) => return Err(DiffClientError::FileNotFound { path }),
        };
        let size = file
            .metadata()
            .map_err(|_| DiffClientError::FileNotFound { path: path.clone() })?
            .len();

        let mut magic = [0u8; 4];
        let mime_type = if file.read_exact(&mut magic).is_ok() && &magic == b"%PDF" {
            PDF_MIME.to_string()
        } else {
            String::new()
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Candidate {} ({} bytes, mime '{}')", name, size, mime_type);
        Ok(Self {
            path,
            name,
            size,
            mime_type,
        })
    }

    /// MIME type is `application/pdf` or the name ends in `.pdf`, any case.
    pub fn looks_like_pdf(&self) -> bool {
        self.mime_type == PDF_MIME || self.name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// Validate a selection for upload.
///
/// A wrong count short-circuits; otherwise every per-file check runs and all
/// failures are returned together.
pub fn validate_files(files: &[FileCandidate]) -> Result<(), Vec<ValidationError>> {
    if files.len() != 2 {
        return Err(vec![ValidationError::InvalidFileCount { count: files.len() }]);
    }

    let mut errors = Vec::new();
    for file in files {
        if !file.looks_like_pdf() {
            errors.push(ValidationError::UnsupportedFormat {
                name: file.name.clone(),
            });
        }
        if file.size > MAX_FILE_SIZE_BYTES {
            errors.push(ValidationError::FileTooLarge {
                name: file.name.clone(),
                size: file.size,
            });
        }
    }
    if has_duplicate_files(files) {
        errors.push(ValidationError::DuplicateFiles {
            name: files[0].name.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Two entries share both name and size. Content is not compared.
pub fn has_duplicate_files(files: &[FileCandidate]) -> bool {
    files.iter().enumerate().any(|(i, a)| {
        files[i + 1..]
            .iter()
            .any(|b| a.name == b.name && a.size == b.size)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pdf(name: &str, size: u64) -> FileCandidate {
        FileCandidate::new(format!("/tmp/{name}"), name, size, PDF_MIME)
    }

    #[test]
    fn wrong_count_short_circuits() {
        for n in [0usize, 1, 3] {
            let files: Vec<_> = (0..n).map(|i| pdf(&format!("{i}.pdf"), 10)).collect();
            let errs = validate_files(&files).unwrap_err();
            assert_eq!(errs, vec![ValidationError::InvalidFileCount { count: n }]);
        }
    }

    #[test]
    fn uppercase_extension_with_empty_mime_passes() {
        let files = [
            FileCandidate::new("/x/a.PDF", "a.PDF", 100, ""),
            pdf("b.pdf", 200),
        ];
        assert!(validate_files(&files).is_ok());
    }

    #[test]
    fn mime_alone_is_enough() {
        let files = [
            FileCandidate::new("/x/scan", "scan", 100, PDF_MIME),
            pdf("b.pdf", 200),
        ];
        assert!(validate_files(&files).is_ok());
    }

    #[test]
    fn errors_accumulate() {
        let files = [
            FileCandidate::new("/x/notes.txt", "notes.txt", 10, "text/plain"),
            pdf("big.pdf", MAX_FILE_SIZE_BYTES + 1),
        ];
        let errs = validate_files(&files).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(matches!(errs[0], ValidationError::UnsupportedFormat { .. }));
        assert!(matches!(errs[1], ValidationError::FileTooLarge { .. }));
    }

    #[test]
    fn exactly_fifty_megabytes_is_allowed() {
        let files = [pdf("a.pdf", MAX_FILE_SIZE_BYTES), pdf("b.pdf", 1)];
        assert!(validate_files(&files).is_ok());
    }

    #[test]
    fn duplicates_by_name_and_size() {
        let a = FileCandidate::new("/one/r.pdf", "r.pdf", 42, PDF_MIME);
        let b = FileCandidate::new("/two/r.pdf", "r.pdf", 42, PDF_MIME);
        assert!(has_duplicate_files(&[a.clone(), b.clone()]));
        let errs = validate_files(&[a.clone(), b]).unwrap_err();
        assert_eq!(errs, vec![ValidationError::DuplicateFiles { name: "r.pdf".into() }]);

        let c = FileCandidate::new("/two/r.pdf", "r.pdf", 43, PDF_MIME);
        assert!(!has_duplicate_files(&[a, c]));
    }

    #[test]
    fn from_path_sniffs_magic() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("doc.bin");
        std::fs::File::create(&real)
            .unwrap()
            .write_all(b"%PDF-1.7\n...")
            .unwrap();
        let c = FileCandidate::from_path(&real).unwrap();
        assert_eq!(c.mime_type, PDF_MIME);
        assert_eq!(c.name, "doc.bin");
        assert_eq!(c.size, 12);

        let fake = dir.path().join("fake.txt");
        std::fs::write(&fake, b"hello").unwrap();
        assert_eq!(FileCandidate::from_path(&fake).unwrap().mime_type, "");
    }

    #[test]
    fn from_path_missing_file() {
        let err = FileCandidate::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, DiffClientError::FileNotFound { .. }));
    }
}

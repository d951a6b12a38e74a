use crate::config::SUPPORTED_DOCUMENT_EXTENSIONS;
use crate::document::Document;
use crate::error::{AppError, Result};
use std::fs;
use std::path::Path;

/// Returns true when the path has a supported document extension.
pub fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| SUPPORTED_DOCUMENT_EXTENSIONS.contains(&ext_str.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists the PDF files directly inside `dir`, sorted by path.
///
/// Paths are made absolute so cache keys do not depend on the working
/// directory.
pub fn scan_pdf_directory(dir: &Path) -> Result<Vec<Document>> {
    let scan_error = |source| AppError::DirectoryScan {
        path: dir.to_path_buf(),
        source,
    };

    let dir = std::path::absolute(dir).map_err(scan_error)?;

    let mut paths: Vec<_> = fs::read_dir(&dir)
        .map_err(scan_error)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_document(path))
        .collect();

    paths.sort();
    Ok(paths.into_iter().map(Document::new).collect())
}

/// Log-friendly path formatting.
pub trait PathExt {
    fn format_for_log(&self) -> String;
}

impl PathExt for Path {
    fn format_for_log(&self) -> String {
        match self.file_name() {
            Some(name) => format!("{} ({})", name.to_string_lossy(), self.display()),
            None => self.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(is_supported_document(Path::new("a.pdf")));
        assert!(is_supported_document(Path::new("b.PDF")));
        assert!(!is_supported_document(Path::new("c.pdf.txt")));
        assert!(!is_supported_document(Path::new("noext")));
    }

    #[test]
    fn scan_lists_only_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("b.pdf")).unwrap();
        File::create(dir.path().join("A.PDF")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let docs = scan_pdf_directory(dir.path()).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name()).collect();

        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
        assert!(docs.iter().all(|d| d.path().is_absolute()));
    }

    #[test]
    fn scan_of_missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let err = scan_pdf_directory(&missing).unwrap_err();
        assert!(matches!(err, AppError::DirectoryScan { .. }));
    }
}

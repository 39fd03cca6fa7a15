//! Import Discovery
//!
//! Collects style partials kept on disk into an import table. Files are named
//! by their path relative to the scanned root; resolution later flattens that
//! to the file stem anyway.

use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::compile::SassImport;
use crate::error::{Result, StyleError};

lazy_static! {
    static ref STYLE_FILE: Regex = Regex::new(r"\.(scss|sass|css)$").unwrap();
}

/// Read every `.scss`, `.sass` and `.css` file under `base_dir`.
///
/// Unreadable files are logged and skipped. The result is sorted by filename
/// so import tables built from the same tree are identical.
pub fn discover_imports(base_dir: impl AsRef<Path>) -> Result<Vec<SassImport>> {
    let base_dir = base_dir.as_ref();
    if !base_dir.is_dir() {
        return Err(StyleError::config(
            Some(base_dir.to_path_buf()),
            "import directory does not exist",
        ));
    }

    let mut imports = Vec::new();
    for path in find_style_files(base_dir) {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read style import");
                continue;
            }
        };

        let relative = path.strip_prefix(base_dir).unwrap_or(&path);
        let filename = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        imports.push(SassImport::new(filename, content));
    }

    imports.sort_by(|a, b| a.filename.cmp(&b.filename));
    tracing::debug!(dir = %base_dir.display(), count = imports.len(), "discovered style imports");
    Ok(imports)
}

fn find_style_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() && STYLE_FILE.is_match(&path.to_string_lossy()) {
            files.push(path.to_path_buf());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ImportSyntax;

    #[test]
    fn test_discovers_style_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("theme.scss"), "$c: red;").unwrap();
        fs::write(dir.path().join("partials/_reset.css"), "*{margin:0}").unwrap();
        fs::write(dir.path().join("partials/grid.sass"), ".g\n  display: grid").unwrap();
        fs::write(dir.path().join("notes.md"), "# not a style").unwrap();

        let imports = discover_imports(dir.path()).unwrap();
        let names: Vec<&str> = imports.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["partials/_reset.css", "partials/grid.sass", "theme.scss"]
        );
        assert_eq!(imports[0].name(), "_reset");
        assert_eq!(imports[1].syntax(), ImportSyntax::Sass);
        assert_eq!(imports[2].content, "$c: red;");
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_imports(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StyleError::Config { .. }));
    }
}

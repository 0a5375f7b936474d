use std::collections::BTreeSet;
use std::fs;
use std::path::{self, Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use pdfconv_core::{extension_key, normalize_extension};

/// Finds convertible files directly inside a folder.
#[derive(Debug, Clone)]
pub struct FileScanner {
    extensions: BTreeSet<String>,
}

impl FileScanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        }
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        extension_key(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Absolute paths of matching regular files, sorted by file name.
    ///
    /// Not recursive. An unreadable folder yields an empty list.
    pub fn scan_folder(&self, folder: &Path) -> Vec<PathBuf> {
        if !folder.is_dir() {
            engine_warn!("Invalid folder path: {}", folder.display());
            return Vec::new();
        }

        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                engine_warn!("Error scanning folder {}: {}", folder.display(), err);
                return Vec::new();
            }
        };

        let mut found: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && self.accepts(p))
            .filter_map(|p| path::absolute(p).ok())
            .collect();
        found.sort_by_key(|p| p.file_name().map(|name| name.to_os_string()));

        engine_info!(
            "Found {} convertible file(s) in {}",
            found.len(),
            folder.display()
        );
        found
    }
}

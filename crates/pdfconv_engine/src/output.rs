use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};
use std::process::Command;

use chrono::Local;
use engine_logging::{engine_error, engine_info, engine_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const DEFAULT_OUTPUT_FOLDER_NAME: &str = "PDF_Output";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("not a folder: {0}")]
    InvalidBase(String),
    #[error("unusable output folder {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` (and its parents) unless it already exists, then checks that
/// PDFs can be written into it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), OutputError> {
    let unusable = |reason: String| OutputError::OutputDir(format!("{}: {reason}", dir.display()));
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(unusable("exists but is not a folder".to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| unusable(format!("cannot create: {err}")))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    if !accepts_new_files(dir) {
        return Err(unusable("not writable".to_string()));
    }
    Ok(())
}

/// Creates `{base}/{name}[_YYYYmmdd_HHMMSS]` and returns its absolute path.
///
/// An existing folder of the same name is reused.
pub fn create_output_folder(
    base: &Path,
    name: Option<&str>,
    use_timestamp: bool,
) -> Result<PathBuf, OutputError> {
    if !base.is_dir() {
        return Err(OutputError::InvalidBase(base.display().to_string()));
    }

    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_OUTPUT_FOLDER_NAME);
    let folder_name = if use_timestamp {
        format!("{name}_{}", Local::now().format("%Y%m%d_%H%M%S"))
    } else {
        name.to_string()
    };

    let folder = path::absolute(base.join(folder_name))?;
    if let Err(err) = ensure_output_dir(&folder) {
        engine_error!("Failed to create output folder {:?}: {}", folder, err);
        return Err(err);
    }
    engine_info!("Created output folder: {}", folder.display());
    Ok(folder)
}

/// True when the parent of `output_path` exists and accepts new files.
pub fn validate_output_path(output_path: &Path) -> bool {
    match output_path.parent() {
        Some(parent) if parent.is_dir() => accepts_new_files(parent),
        _ => false,
    }
}

// A scratch file that is removed again on drop.
fn accepts_new_files(dir: &Path) -> bool {
    NamedTempFile::new_in(dir).is_ok()
}

/// Opens `folder` in the platform file browser.
pub fn open_folder_in_file_browser(folder: &Path) -> bool {
    if !folder.is_dir() {
        engine_warn!("Cannot open non-existent folder: {}", folder.display());
        return false;
    }

    let launcher = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    // explorer.exe exits with 1 even on success, so only spawn failures count.
    match Command::new(launcher).arg(folder).spawn() {
        Ok(_) => {
            engine_info!("Opened folder in file browser: {}", folder.display());
            true
        }
        Err(err) => {
            engine_error!("Failed to open folder with {}: {}", launcher, err);
            false
        }
    }
}

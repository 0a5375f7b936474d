use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::registry::extension_key;
use crate::ConvertError;

/// Free-form per-converter tuning (page ranges, sheet layout, ...).
pub type JobOptions = BTreeMap<String, String>;

/// One validated request to convert `input_path` into the PDF at `output_path`.
///
/// Fields are private so a job can only come out of [`ConversionJob::new`] or
/// [`ConversionJob::with_details`], both of which reject empty paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    input_path: PathBuf,
    output_path: PathBuf,
    output_folder: Option<PathBuf>,
    options: JobOptions,
}

impl ConversionJob {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, ConvertError> {
        Self::with_details(input_path, output_path, None, JobOptions::new())
    }

    pub fn with_details(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        output_folder: Option<PathBuf>,
        options: JobOptions,
    ) -> Result<Self, ConvertError> {
        let input_path = input_path.into();
        let output_path = output_path.into();
        if input_path.as_os_str().is_empty() {
            return Err(ConvertError::Validation("input path cannot be empty".into()));
        }
        if output_path.as_os_str().is_empty() {
            return Err(ConvertError::Validation("output path cannot be empty".into()));
        }
        Ok(Self {
            input_path,
            output_path,
            output_folder,
            options,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn output_folder(&self) -> Option<&Path> {
        self.output_folder.as_deref()
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Lowercased extension of the input, including the leading dot.
    pub fn extension(&self) -> Option<String> {
        extension_key(&self.input_path)
    }

    /// File name of the input, for human-readable messages.
    pub fn display_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

use std::collections::BTreeMap;
use std::path::{self, Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};

use crate::{
    extension_key, sanitize_file_stem, ConversionJob, ConversionResult, ConvertError, Converter,
    ConverterRegistry, JobOptions,
};

/// Progress notification emitted after each job of a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    /// Jobs finished so far, including this one.
    pub completed: usize,
    pub total: usize,
    pub job: &'a ConversionJob,
    pub result: &'a ConversionResult,
}

/// Builds jobs, resolves converters and dispatches conversions.
///
/// The service never touches the external application itself; converters do.
/// Conversions run strictly one after another on the calling thread.
#[derive(Debug, Default, Clone)]
pub struct ConversionService {
    registry: ConverterRegistry,
}

impl ConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ConverterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) {
        self.registry.register(converter);
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.registry.extensions()
    }

    pub fn available_converters(&self) -> BTreeMap<String, String> {
        self.registry.converter_names()
    }

    /// Creates a job for `input_path`.
    ///
    /// The PDF is named after `custom_output_name` when given, else after the
    /// input's stem. It goes into `output_folder` when given, else next to the
    /// input.
    pub fn create_job(
        &self,
        input_path: &Path,
        output_folder: Option<&Path>,
        custom_output_name: Option<&str>,
    ) -> Result<ConversionJob, ConvertError> {
        self.create_job_with_options(input_path, output_folder, custom_output_name, JobOptions::new())
    }

    pub fn create_job_with_options(
        &self,
        input_path: &Path,
        output_folder: Option<&Path>,
        custom_output_name: Option<&str>,
        options: JobOptions,
    ) -> Result<ConversionJob, ConvertError> {
        if !input_path.is_file() {
            return Err(ConvertError::Validation(format!(
                "file not found: {}",
                input_path.display()
            )));
        }
        let input = absolute(input_path)?;

        if self.registry.resolve_path(&input).is_none() {
            let ext = extension_key(&input).unwrap_or_else(|| "<none>".to_string());
            return Err(ConvertError::UnsupportedFileType(format!(
                "{ext} (supported: {})",
                self.supported_extensions().join(", ")
            )));
        }

        let stem = custom_output_name
            .and_then(sanitize_file_stem)
            .or_else(|| {
                input
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .ok_or_else(|| {
                ConvertError::Validation(format!("cannot derive a file name from {}", input.display()))
            })?;
        let pdf_name = format!("{stem}.pdf");

        let output_folder = output_folder
            .filter(|folder| !folder.as_os_str().is_empty())
            .map(absolute)
            .transpose()?;
        let output_path = match &output_folder {
            Some(folder) => folder.join(&pdf_name),
            None => input.with_file_name(&pdf_name),
        };

        engine_debug!(
            "Created job {} -> {}",
            input.display(),
            output_path.display()
        );
        ConversionJob::with_details(input, output_path, output_folder, options)
    }

    /// Runs one job through its converter.
    ///
    /// An unknown extension yields a failed result rather than an error so that
    /// a batch in progress keeps going.
    pub fn convert(&self, job: &ConversionJob) -> ConversionResult {
        let Some(converter) = self.registry.resolve_path(job.input_path()) else {
            let ext = job.extension().unwrap_or_else(|| "<none>".to_string());
            return ConversionResult::from_error(ConvertError::UnsupportedFileType(format!(
                "no converter registered for {ext}"
            )));
        };

        engine_info!(
            "Converting {} using {}",
            job.input_path().display(),
            converter.name()
        );
        converter.convert(job)
    }

    /// Converts every job in order. The result at index `i` belongs to `jobs[i]`.
    pub fn convert_batch(&self, jobs: &[ConversionJob]) -> Vec<ConversionResult> {
        self.convert_batch_with_progress(jobs, |_| {})
    }

    pub fn convert_batch_with_progress<F>(
        &self,
        jobs: &[ConversionJob],
        mut on_progress: F,
    ) -> Vec<ConversionResult>
    where
        F: FnMut(BatchProgress<'_>),
    {
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        for (index, job) in jobs.iter().enumerate() {
            let result = self.convert(job);
            on_progress(BatchProgress {
                completed: index + 1,
                total,
                job,
                result: &result,
            });
            results.push(result);
        }
        results
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConvertError> {
    path::absolute(path)
        .map_err(|err| ConvertError::Validation(format!("invalid path {}: {err}", path.display())))
}

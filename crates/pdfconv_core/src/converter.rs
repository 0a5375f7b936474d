use crate::{ConversionJob, ConversionResult};

/// A collaborator able to turn one or more file families into PDF.
///
/// `convert` must never panic out or leave the external application running:
/// every failure is reported through [`ConversionResult::Failure`].
pub trait Converter: Send + Sync {
    /// Human-readable name used in logs and UI grouping.
    fn name(&self) -> &str;

    /// Extensions handled by this converter, with leading dot (e.g. `.docx`).
    fn supported_extensions(&self) -> &[&str];

    fn convert(&self, job: &ConversionJob) -> ConversionResult;
}

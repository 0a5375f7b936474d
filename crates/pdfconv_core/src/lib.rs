//! PdfConverter core: job model, converter registry and conversion dispatch.
mod converter;
mod error;
mod filename;
mod job;
mod registry;
mod result;
mod service;
mod summary;

pub use converter::Converter;
pub use error::ConvertError;
pub use filename::sanitize_file_stem;
pub use job::{ConversionJob, JobOptions};
pub use registry::{extension_key, normalize_extension, ConverterRegistry};
pub use result::ConversionResult;
pub use service::{BatchProgress, ConversionService};
pub use summary::BatchSummary;

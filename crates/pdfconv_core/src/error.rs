use thiserror::Error;

/// Error taxonomy shared by job creation and conversion results.
///
/// Only `Validation` and `UnsupportedFileType` are ever returned as `Err` (from
/// job creation). Everything that happens during conversion travels inside a
/// [`crate::ConversionResult::Failure`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("office application error: {0}")]
    OfficeApplication(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ConvertError {
    /// The message without the category prefix, as shown to users.
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(detail)
            | Self::UnsupportedFileType(detail)
            | Self::OfficeApplication(detail)
            | Self::Conversion(detail)
            | Self::Unexpected(detail) => detail,
        }
    }
}

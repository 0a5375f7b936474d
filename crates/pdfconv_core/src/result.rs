use std::fmt;
use std::path::{Path, PathBuf};

use crate::ConvertError;

/// Outcome of one job. There is no intermediate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success { output_path: PathBuf, message: String },
    Failure { message: String, error: ConvertError },
}

impl ConversionResult {
    pub fn success(output_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Success {
            output_path: output_path.into(),
            message: message.into(),
        }
    }

    pub fn failure(error: ConvertError, message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            error,
        }
    }

    /// Failure whose message is the error's own display text.
    pub fn from_error(error: ConvertError) -> Self {
        let message = error.to_string();
        Self::failure(error, message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path, .. } => Some(output_path),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                output_path,
                message,
            } => write!(f, "{message} -> {}", output_path.display()),
            Self::Failure { message, .. } => write!(f, "{message}"),
        }
    }
}

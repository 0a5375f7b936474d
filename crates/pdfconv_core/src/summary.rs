use std::fmt;

use crate::ConversionResult;

const MAX_LISTED_FAILURES: usize = 5;

/// Counts for a finished batch. Partial success is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Failure messages in job order.
    pub failure_messages: Vec<String>,
}

impl BatchSummary {
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.failure_messages.push(result.message().to_string());
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Successful: {}\nFailed: {}", self.succeeded, self.failed)?;
        if !self.failure_messages.is_empty() {
            write!(f, "\n\nErrors:")?;
            for message in self.failure_messages.iter().take(MAX_LISTED_FAILURES) {
                write!(f, "\n{message}")?;
            }
            let hidden = self.failure_messages.len().saturating_sub(MAX_LISTED_FAILURES);
            if hidden > 0 {
                write!(f, "\n... and {hidden} more")?;
            }
        }
        Ok(())
    }
}

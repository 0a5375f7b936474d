use std::panic::{self, AssertUnwindSafe};
use std::path::{self, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_error, engine_info, engine_warn};
use pdfconv_core::{ConversionJob, ConversionResult, ConvertError, Converter};

use crate::automation::{ExportSettings, OfficeApp, OfficeBackend, SessionGuard};
use crate::worker::panic_message;

/// Converts one application family to PDF through an [`OfficeBackend`].
///
/// Must run on the thread that owns the automation session, i.e. inside a
/// task on the [`crate::SerializedWorker`].
pub struct OfficeConverter {
    app: OfficeApp,
    backend: Arc<dyn OfficeBackend>,
}

impl OfficeConverter {
    pub fn new(app: OfficeApp, backend: Arc<dyn OfficeBackend>) -> Self {
        Self { app, backend }
    }

    /// One converter per family, all sharing `backend`.
    pub fn for_all_apps(backend: Arc<dyn OfficeBackend>) -> Vec<Self> {
        OfficeApp::ALL
            .iter()
            .map(|app| Self::new(*app, backend.clone()))
            .collect()
    }

    pub fn app(&self) -> OfficeApp {
        self.app
    }

    fn run(&self, job: &ConversionJob) -> Result<PathBuf, ConvertError> {
        engine_info!("Starting {} conversion: {}", self.app, job.input_path().display());

        let input = path::absolute(job.input_path())
            .map_err(|err| ConvertError::Conversion(format!("Invalid input path: {err}")))?;
        let output = path::absolute(job.output_path())
            .map_err(|err| ConvertError::Conversion(format!("Invalid output path: {err}")))?;

        let session = self.backend.launch(self.app).map_err(|err| {
            ConvertError::OfficeApplication(format!(
                "Failed to initialize {}. Ensure it is installed. Error: {err}",
                self.app
            ))
        })?;
        let mut session = SessionGuard::new(self.app, session);

        let mut document = session.open_document(&input).map_err(|err| {
            ConvertError::Conversion(format!(
                "Failed to open {}: {err}",
                self.app.document_noun()
            ))
        })?;

        let settings = ExportSettings::for_job(self.app, job);
        if let Err(err) = document.configure_export(&settings) {
            engine_warn!(
                "{} layout optimization failed, using default settings: {}",
                self.app,
                err
            );
        }

        document
            .export_pdf(&output)
            .map_err(|err| ConvertError::Conversion(format!("Failed to export as PDF: {err}")))?;

        engine_info!("{} conversion successful: {}", self.app, output.display());
        Ok(output)
    }
}

impl Converter for OfficeConverter {
    fn name(&self) -> &str {
        self.app.display_name()
    }

    fn supported_extensions(&self) -> &[&str] {
        self.app.extensions()
    }

    fn convert(&self, job: &ConversionJob) -> ConversionResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(job))) {
            Ok(Ok(output)) => ConversionResult::success(
                output,
                format!("Successfully converted {}", job.display_name()),
            ),
            Ok(Err(err)) => {
                engine_error!("{} conversion failed: {}", self.app, err);
                let message = err.detail().to_string();
                ConversionResult::failure(err, message)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                engine_error!("Unexpected error during {} conversion: {}", self.app, message);
                ConversionResult::failure(
                    ConvertError::Unexpected(message.clone()),
                    format!("Unexpected error: {message}"),
                )
            }
        }
    }
}

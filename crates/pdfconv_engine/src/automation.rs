//! Abstraction over the external office application.
//!
//! A backend launches an application session; the session opens documents.
//! Neither handle is `Send`: both are created, used and released on the thread
//! running the conversion. [`SessionGuard`] and [`DocumentGuard`] release them
//! on every exit path, document first.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use pdfconv_core::ConversionJob;
use thiserror::Error;

use crate::worker::panic_message;

/// Application family driven for a group of file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfficeApp {
    WordProcessor,
    Spreadsheet,
    Presentation,
}

impl OfficeApp {
    pub const ALL: [OfficeApp; 3] = [
        OfficeApp::WordProcessor,
        OfficeApp::Spreadsheet,
        OfficeApp::Presentation,
    ];

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            OfficeApp::WordProcessor => &[".doc", ".docx"],
            OfficeApp::Spreadsheet => &[".xls", ".xlsx", ".xlsm"],
            OfficeApp::Presentation => &[".ppt", ".pptx"],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OfficeApp::WordProcessor => "Word",
            OfficeApp::Spreadsheet => "Excel",
            OfficeApp::Presentation => "PowerPoint",
        }
    }

    pub fn document_noun(self) -> &'static str {
        match self {
            OfficeApp::WordProcessor => "document",
            OfficeApp::Spreadsheet => "workbook",
            OfficeApp::Presentation => "presentation",
        }
    }

    /// LibreOffice PDF export filter for this family.
    pub fn pdf_filter(self) -> &'static str {
        match self {
            OfficeApp::WordProcessor => "writer_pdf_Export",
            OfficeApp::Spreadsheet => "calc_pdf_Export",
            OfficeApp::Presentation => "impress_pdf_Export",
        }
    }
}

impl fmt::Display for OfficeApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
}

/// Named PDF export settings applied before export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportSettings {
    values: BTreeMap<String, FilterValue>,
}

impl ExportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: FilterValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Family defaults, adjusted by the job's `pages` and `fit_to_page` options.
    pub fn for_job(app: OfficeApp, job: &ConversionJob) -> Self {
        let mut settings = match app {
            OfficeApp::WordProcessor => Self::new()
                .with("ExportBookmarks", FilterValue::Bool(true))
                .with("UseTaggedPDF", FilterValue::Bool(true)),
            OfficeApp::Spreadsheet => {
                let fit = job.option("fit_to_page").map_or(true, |v| !is_false(v));
                Self::new().with("SinglePageSheets", FilterValue::Bool(fit))
            }
            OfficeApp::Presentation => {
                Self::new().with("ExportNotesPages", FilterValue::Bool(false))
            }
        };
        if let Some(pages) = job.option("pages") {
            settings = settings.with("PageRange", FilterValue::Text(pages.trim().to_string()));
        }
        settings
    }
}

fn is_false(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("application unavailable: {0}")]
    Unavailable(String),
    #[error("cannot open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },
    #[error("invalid export setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },
    #[error("{0}")]
    Export(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cleanup failed: {0}")]
    Cleanup(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Launches application sessions. Shared by every job, so it must be `Sync`;
/// the sessions it hands out are not.
pub trait OfficeBackend: Send + Sync {
    /// Starts the application without a window and with prompts suppressed.
    fn launch(&self, app: OfficeApp) -> Result<Box<dyn AppSession>, AutomationError>;
}

pub trait AppSession {
    /// Opens `path` read-only. The document borrows the session, so it is
    /// always released before the session is.
    fn open_document<'s>(
        &'s mut self,
        path: &Path,
    ) -> Result<Box<dyn DocumentHandle + 's>, AutomationError>;

    fn quit(&mut self) -> Result<(), AutomationError>;
}

pub trait DocumentHandle {
    /// Applies export settings. On error the previous settings stay in effect.
    fn configure_export(&mut self, settings: &ExportSettings) -> Result<(), AutomationError>;

    fn export_pdf(&mut self, output: &Path) -> Result<(), AutomationError>;

    /// Closes without saving.
    fn close(&mut self) -> Result<(), AutomationError>;
}

/// Quits the application session when dropped.
pub struct SessionGuard {
    app: OfficeApp,
    session: Box<dyn AppSession>,
}

impl SessionGuard {
    pub fn new(app: OfficeApp, session: Box<dyn AppSession>) -> Self {
        Self { app, session }
    }

    pub fn open_document(&mut self, path: &Path) -> Result<DocumentGuard<'_>, AutomationError> {
        let document = self.session.open_document(path)?;
        Ok(DocumentGuard {
            app: self.app,
            document,
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session = &mut self.session;
        release(self.app, "application session", || session.quit());
    }
}

/// Closes the document when dropped.
pub struct DocumentGuard<'s> {
    app: OfficeApp,
    document: Box<dyn DocumentHandle + 's>,
}

impl DocumentGuard<'_> {
    pub fn configure_export(&mut self, settings: &ExportSettings) -> Result<(), AutomationError> {
        self.document.configure_export(settings)
    }

    pub fn export_pdf(&mut self, output: &Path) -> Result<(), AutomationError> {
        self.document.export_pdf(output)
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        let document = &mut self.document;
        release(self.app, "document", || document.close());
    }
}

// Cleanup never propagates: errors and panics are logged and swallowed.
fn release<F>(app: OfficeApp, what: &str, close: F)
where
    F: FnOnce() -> Result<(), AutomationError>,
{
    match panic::catch_unwind(AssertUnwindSafe(close)) {
        Ok(Ok(())) => engine_debug!("{} {} released", app, what),
        Ok(Err(err)) => engine_warn!("Failed to release {} {}: {}", app, what, err),
        Err(payload) => engine_warn!(
            "Releasing {} {} panicked: {}",
            app,
            what,
            panic_message(payload.as_ref())
        ),
    }
}

//! PdfConverter engine: serialized execution, office automation and file IO.
mod automation;
mod office;
mod output;
mod scan;
mod soffice;
mod worker;

pub use automation::{
    AppSession, AutomationError, DocumentGuard, DocumentHandle, ExportSettings, FilterValue,
    OfficeApp, OfficeBackend, SessionGuard,
};
pub use office::OfficeConverter;
pub use output::{
    create_output_folder, ensure_output_dir, open_folder_in_file_browser, validate_output_path,
    OutputError, DEFAULT_OUTPUT_FOLDER_NAME,
};
pub use scan::FileScanner;
pub use soffice::{SofficeBackend, SofficeSettings};
pub use worker::{SerializedWorker, TaskFailure, WorkerError, WorkerSettings};

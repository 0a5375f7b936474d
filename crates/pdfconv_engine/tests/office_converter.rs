use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use pdfconv_core::{ConversionJob, ConversionService, ConvertError, Converter, JobOptions};
use pdfconv_engine::{
    AppSession, AutomationError, DocumentHandle, ExportSettings, FilterValue, OfficeApp,
    OfficeBackend, OfficeConverter, SerializedWorker, WorkerSettings,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

type EventLog = Arc<Mutex<Vec<String>>>;

/// Which automation step misbehaves, and how.
#[derive(Debug, Clone, Default)]
struct Script {
    fail_launch: bool,
    fail_open: bool,
    fail_configure: bool,
    fail_export: bool,
    panic_export: bool,
    fail_close: bool,
    panic_close: bool,
}

struct ScriptedBackend {
    script: Script,
    events: EventLog,
    settings: Arc<Mutex<Option<ExportSettings>>>,
    launch_threads: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            events: EventLog::default(),
            settings: Arc::default(),
            launch_threads: Arc::default(),
        })
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl OfficeBackend for ScriptedBackend {
    fn launch(&self, app: OfficeApp) -> Result<Box<dyn AppSession>, AutomationError> {
        self.events.lock().unwrap().push(format!("launch {app}"));
        self.launch_threads
            .lock()
            .unwrap()
            .push(thread::current().name().map(str::to_string));
        if self.script.fail_launch {
            return Err(AutomationError::Unavailable("not installed".into()));
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            events: self.events.clone(),
            settings: self.settings.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Script,
    events: EventLog,
    settings: Arc<Mutex<Option<ExportSettings>>>,
}

impl AppSession for ScriptedSession {
    fn open_document<'s>(
        &'s mut self,
        path: &Path,
    ) -> Result<Box<dyn DocumentHandle + 's>, AutomationError> {
        self.events.lock().unwrap().push("open".into());
        if self.script.fail_open {
            return Err(AutomationError::Open {
                path: path.to_path_buf(),
                reason: "password protected".into(),
            });
        }
        Ok(Box::new(ScriptedDocument { session: &*self }))
    }

    fn quit(&mut self) -> Result<(), AutomationError> {
        self.events.lock().unwrap().push("quit".into());
        Ok(())
    }
}

struct ScriptedDocument<'s> {
    session: &'s ScriptedSession,
}

impl ScriptedDocument<'_> {
    fn record(&self, event: &str) {
        self.session.events.lock().unwrap().push(event.into());
    }
}

impl DocumentHandle for ScriptedDocument<'_> {
    fn configure_export(&mut self, settings: &ExportSettings) -> Result<(), AutomationError> {
        self.record("configure");
        if self.session.script.fail_configure {
            return Err(AutomationError::InvalidSetting {
                name: "SinglePageSheets".into(),
                reason: "read-only sheet".into(),
            });
        }
        *self.session.settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    fn export_pdf(&mut self, output: &Path) -> Result<(), AutomationError> {
        self.record("export");
        if self.session.script.panic_export {
            panic!("automation server vanished");
        }
        if self.session.script.fail_export {
            return Err(AutomationError::Export("printer driver missing".into()));
        }
        fs::write(output, b"%PDF-1.7")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AutomationError> {
        self.record("close");
        if self.session.script.panic_close {
            panic!("close crashed");
        }
        if self.session.script.fail_close {
            return Err(AutomationError::Cleanup("document busy".into()));
        }
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn fixture(file_name: &str) -> Fixture {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join(file_name);
    fs::write(&input, b"document body").unwrap();
    let output = dir.path().join("out.pdf");
    Fixture {
        _dir: dir,
        input,
        output,
    }
}

fn events(list: &[&str]) -> Vec<String> {
    list.iter().map(|event| event.to_string()).collect()
}

#[test]
fn successful_conversion_releases_document_before_application() {
    let fx = fixture("report.docx");
    let backend = ScriptedBackend::new(Script::default());
    let converter = OfficeConverter::new(OfficeApp::WordProcessor, backend.clone());

    let job = ConversionJob::new(&fx.input, &fx.output).unwrap();
    let result = converter.convert(&job);

    assert!(result.is_success(), "{result}");
    assert_eq!(result.output_path(), Some(fx.output.as_path()));
    assert_eq!(result.message(), "Successfully converted report.docx");
    assert_eq!(fs::read(&fx.output).unwrap(), b"%PDF-1.7");
    assert_eq!(
        backend.events(),
        events(&["launch Word", "open", "configure", "export", "close", "quit"])
    );
}

#[test]
fn export_settings_follow_the_application_family() {
    let fx = fixture("budget.xlsx");
    let backend = ScriptedBackend::new(Script::default());
    let converter = OfficeConverter::new(OfficeApp::Spreadsheet, backend.clone());

    let mut options = JobOptions::new();
    options.insert("pages".into(), "1-2".into());
    let job = ConversionJob::with_details(&fx.input, &fx.output, None, options).unwrap();
    assert!(converter.convert(&job).is_success());

    let settings = backend.settings.lock().unwrap().clone().unwrap();
    assert_eq!(settings.get("SinglePageSheets"), Some(&FilterValue::Bool(true)));
    assert_eq!(
        settings.get("PageRange"),
        Some(&FilterValue::Text("1-2".into()))
    );
}

#[test]
fn launch_failure_is_an_office_application_error() {
    let fx = fixture("slides.pptx");
    let backend = ScriptedBackend::new(Script {
        fail_launch: true,
        ..Script::default()
    });
    let converter = OfficeConverter::new(OfficeApp::Presentation, backend.clone());

    let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

    assert!(!result.is_success());
    match result.error() {
        Some(ConvertError::OfficeApplication(message)) => {
            assert!(message.contains("Failed to initialize PowerPoint"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(result.message().starts_with("Failed to initialize PowerPoint"));
    assert_eq!(backend.events(), events(&["launch PowerPoint"]));
    assert!(!fx.output.exists());
}

#[test]
fn open_failure_still_quits_the_application() {
    let fx = fixture("locked.docx");
    let backend = ScriptedBackend::new(Script {
        fail_open: true,
        ..Script::default()
    });
    let converter = OfficeConverter::new(OfficeApp::WordProcessor, backend.clone());

    let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

    match result.error() {
        Some(ConvertError::Conversion(message)) => {
            assert!(message.starts_with("Failed to open document"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(backend.events(), events(&["launch Word", "open", "quit"]));
}

#[test]
fn layout_tuning_failure_is_not_fatal() {
    let fx = fixture("wide.xlsx");
    let backend = ScriptedBackend::new(Script {
        fail_configure: true,
        ..Script::default()
    });
    let converter = OfficeConverter::new(OfficeApp::Spreadsheet, backend.clone());

    let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

    assert!(result.is_success(), "{result}");
    assert_eq!(
        backend.events(),
        events(&["launch Excel", "open", "configure", "export", "close", "quit"])
    );
}

#[test]
fn export_failure_reports_conversion_error_and_releases_everything() {
    let fx = fixture("report.doc");
    let backend = ScriptedBackend::new(Script {
        fail_export: true,
        ..Script::default()
    });
    let converter = OfficeConverter::new(OfficeApp::WordProcessor, backend.clone());

    let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

    match result.error() {
        Some(ConvertError::Conversion(message)) => {
            assert!(message.starts_with("Failed to export as PDF"), "{message}");
            assert!(message.contains("printer driver missing"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        result.message(),
        "Failed to export as PDF: printer driver missing"
    );
    assert_eq!(
        backend.events(),
        events(&["launch Word", "open", "configure", "export", "close", "quit"])
    );
}

#[test]
fn cleanup_failures_do_not_mask_success() {
    for script in [
        Script {
            fail_close: true,
            ..Script::default()
        },
        Script {
            panic_close: true,
            ..Script::default()
        },
    ] {
        let fx = fixture("memo.docx");
        let backend = ScriptedBackend::new(script);
        let converter = OfficeConverter::new(OfficeApp::WordProcessor, backend.clone());

        let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

        assert!(result.is_success(), "{result}");
        assert_eq!(backend.events().last().map(String::as_str), Some("quit"));
    }
}

#[test]
fn panic_mid_export_becomes_unexpected_failure() {
    let fx = fixture("deck.ppt");
    let backend = ScriptedBackend::new(Script {
        panic_export: true,
        ..Script::default()
    });
    let converter = OfficeConverter::new(OfficeApp::Presentation, backend.clone());

    let result = converter.convert(&ConversionJob::new(&fx.input, &fx.output).unwrap());

    assert!(!result.is_success());
    assert_eq!(
        result.error(),
        Some(&ConvertError::Unexpected("automation server vanished".into()))
    );
    assert!(result.message().starts_with("Unexpected error:"));
    assert_eq!(
        backend.events(),
        events(&["launch PowerPoint", "open", "configure", "export", "close", "quit"])
    );
}

#[test]
fn worker_keeps_converting_after_a_crashed_job() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let broken_input = dir.path().join("broken.pptx");
    let good_input = dir.path().join("good.docx");
    fs::write(&broken_input, b"x").unwrap();
    fs::write(&good_input, b"x").unwrap();

    let crashing = ScriptedBackend::new(Script {
        panic_export: true,
        ..Script::default()
    });
    let healthy = ScriptedBackend::new(Script::default());

    let mut service = ConversionService::new();
    service.register_converter(Arc::new(OfficeConverter::new(
        OfficeApp::Presentation,
        crashing.clone(),
    )));
    service.register_converter(Arc::new(OfficeConverter::new(
        OfficeApp::WordProcessor,
        healthy.clone(),
    )));
    let jobs = vec![
        service.create_job(&broken_input, None, None).unwrap(),
        service.create_job(&good_input, None, None).unwrap(),
    ];

    let worker = SerializedWorker::new(WorkerSettings {
        poll_interval: Duration::from_millis(20),
    });
    worker.start().unwrap();
    let service = Arc::new(service);
    let receivers: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let service = service.clone();
            worker.submit_with_receiver(move || service.convert(&job))
        })
        .collect();
    let results: Vec<_> = receivers
        .into_iter()
        .map(|rx| rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap())
        .collect();
    worker.stop(Duration::from_secs(5));

    assert!(!results[0].is_success());
    assert!(results[1].is_success(), "{}", results[1]);
    assert!(dir.path().join("good.pdf").is_file());

    let threads = healthy.launch_threads.lock().unwrap().clone();
    assert_eq!(threads, vec![Some("conversion-worker".to_string())]);
}

#[test]
fn one_converter_per_family_covers_all_office_extensions() {
    let backend = ScriptedBackend::new(Script::default());
    let mut service = ConversionService::new();
    for converter in OfficeConverter::for_all_apps(backend) {
        service.register_converter(Arc::new(converter));
    }

    assert_eq!(
        service.supported_extensions(),
        vec![".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsm", ".xlsx"]
    );
    let names = service.available_converters();
    assert_eq!(names.get(".xlsm").map(String::as_str), Some("Excel"));
    assert_eq!(names.get(".doc").map(String::as_str), Some("Word"));
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use pdfconv_core::{
    ConversionJob, ConversionResult, ConversionService, ConvertError, Converter, JobOptions,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Converter that records the inputs it saw and fails for names containing "bad".
struct RecordingConverter {
    name: &'static str,
    extensions: Vec<&'static str>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingConverter {
    fn new(name: &'static str, extensions: Vec<&'static str>) -> Self {
        Self {
            name,
            extensions,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Converter for RecordingConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn supported_extensions(&self) -> &[&str] {
        &self.extensions
    }

    fn convert(&self, job: &ConversionJob) -> ConversionResult {
        self.seen.lock().unwrap().push(job.input_path().to_path_buf());
        if job.display_name().contains("bad") {
            ConversionResult::from_error(ConvertError::Conversion("export failed".into()))
        } else {
            ConversionResult::success(job.output_path(), format!("{} done", self.name))
        }
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"content").unwrap();
    path
}

fn word_service() -> ConversionService {
    let mut service = ConversionService::new();
    service.register_converter(Arc::new(RecordingConverter::new(
        "Word",
        vec![".doc", ".DOCX"],
    )));
    service
}

#[test]
fn registration_is_case_insensitive_and_sorted() {
    init_logging();
    let mut service = word_service();
    service.register_converter(Arc::new(RecordingConverter::new("Slides", vec!["pptx"])));

    assert_eq!(
        service.supported_extensions(),
        vec![".doc".to_string(), ".docx".to_string(), ".pptx".to_string()]
    );
    assert_eq!(
        service.available_converters().get(".pptx").map(String::as_str),
        Some("Slides")
    );
    assert!(service.registry().resolve(".DocX").is_some());
}

#[test]
fn last_registration_wins() {
    init_logging();
    let mut service = word_service();
    service.register_converter(Arc::new(RecordingConverter::new("Newer", vec![".docx"])));

    assert_eq!(service.registry().resolve(".docx").unwrap().name(), "Newer");
    // Extensions the newer converter does not claim keep their owner.
    assert_eq!(service.registry().resolve(".doc").unwrap().name(), "Word");
}

#[test]
fn create_job_rejects_missing_file() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let service = word_service();

    let err = service
        .create_job(&temp.path().join("missing.docx"), None, None)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Validation(_)));

    // A directory is not a regular file either.
    let dir = temp.path().join("folder.docx");
    fs::create_dir(&dir).unwrap();
    let err = service.create_job(&dir, None, None).unwrap_err();
    assert!(matches!(err, ConvertError::Validation(_)));
}

#[test]
fn create_job_rejects_unregistered_extensions() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let service = word_service();

    for name in ["sheet.xlsx", "notes.txt", "README"] {
        let path = touch(temp.path(), name);
        let err = service.create_job(&path, None, None).unwrap_err();
        assert!(
            matches!(err, ConvertError::UnsupportedFileType(_)),
            "{name}: {err:?}"
        );
    }
}

#[test]
fn create_job_places_pdf_next_to_input_by_default() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let input = touch(temp.path(), "Letter.DOCX");
    let service = word_service();

    let job = service.create_job(&input, None, None).unwrap();
    assert!(job.input_path().is_absolute());
    assert_eq!(job.output_path(), temp.path().join("Letter.pdf"));
    assert_eq!(job.output_folder(), None);
}

#[test]
fn create_job_honours_output_folder_and_custom_name() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let input = touch(temp.path(), "Letter.docx");
    let out = temp.path().join("PDF_Output");
    let service = word_service();

    let job = service.create_job(&input, Some(&out), None).unwrap();
    assert_eq!(job.output_path(), out.join("Letter.pdf"));
    assert_eq!(job.output_folder(), Some(out.as_path()));

    let job = service
        .create_job(&input, Some(&out), Some("Signed copy"))
        .unwrap();
    assert_eq!(job.output_path(), out.join("Signed copy.pdf"));

    let job = service.create_job(&input, None, Some("renamed")).unwrap();
    assert_eq!(job.output_path(), temp.path().join("renamed.pdf"));

    // An empty custom name falls back to the input stem.
    let job = service.create_job(&input, None, Some("")).unwrap();
    assert_eq!(job.output_path(), temp.path().join("Letter.pdf"));
}

#[test]
fn create_job_keeps_options() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let input = touch(temp.path(), "a.doc");
    let service = word_service();
    let mut options = JobOptions::new();
    options.insert("pages".into(), "2".into());

    let job = service
        .create_job_with_options(&input, None, None, options)
        .unwrap();
    assert_eq!(job.option("pages"), Some("2"));
}

#[test]
fn convert_reports_unregistered_extension_as_failure() {
    init_logging();
    let service = word_service();
    let job = ConversionJob::new("/data/report.xlsx", "/data/report.pdf").unwrap();

    let result = service.convert(&job);
    assert!(!result.is_success());
    assert!(matches!(
        result.error(),
        Some(ConvertError::UnsupportedFileType(_))
    ));
    assert!(result.message().starts_with("unsupported file type:"));
    assert!(result.message().contains(".xlsx"));
}

#[test]
fn batch_preserves_length_and_order_through_failures() {
    init_logging();
    let converter = RecordingConverter::new("Word", vec![".docx"]);
    let seen = converter.seen.clone();
    let mut service = ConversionService::new();
    service.register_converter(Arc::new(converter));

    let jobs = vec![
        ConversionJob::new("/in/one.docx", "/out/one.pdf").unwrap(),
        ConversionJob::new("/in/report.xlsx", "/out/report.pdf").unwrap(),
        ConversionJob::new("/in/bad.docx", "/out/bad.pdf").unwrap(),
        ConversionJob::new("/in/four.docx", "/out/four.pdf").unwrap(),
    ];

    let results = service.convert_batch(&jobs);
    assert_eq!(results.len(), jobs.len());
    assert_eq!(results[0].output_path(), Some(Path::new("/out/one.pdf")));
    assert!(matches!(
        results[1].error(),
        Some(ConvertError::UnsupportedFileType(_))
    ));
    assert!(matches!(results[2].error(), Some(ConvertError::Conversion(_))));
    assert_eq!(results[3].output_path(), Some(Path::new("/out/four.pdf")));

    // The unsupported job never reached the converter; the rest ran in order.
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            PathBuf::from("/in/one.docx"),
            PathBuf::from("/in/bad.docx"),
            PathBuf::from("/in/four.docx"),
        ]
    );
}

#[test]
fn empty_batch_yields_empty_results() {
    let service = word_service();
    assert!(service.convert_batch(&[]).is_empty());
}

#[test]
fn batch_progress_reports_each_job_in_order() {
    init_logging();
    let service = word_service();
    let jobs = vec![
        ConversionJob::new("/in/a.docx", "/out/a.pdf").unwrap(),
        ConversionJob::new("/in/bad.docx", "/out/bad.pdf").unwrap(),
    ];

    let mut seen = Vec::new();
    let results = service.convert_batch_with_progress(&jobs, |progress| {
        seen.push((
            progress.completed,
            progress.total,
            progress.job.display_name(),
            progress.result.is_success(),
        ));
    });

    assert_eq!(results.len(), 2);
    assert_eq!(
        seen,
        vec![
            (1, 2, "a.docx".to_string(), true),
            (2, 2, "bad.docx".to_string(), false),
        ]
    );
}

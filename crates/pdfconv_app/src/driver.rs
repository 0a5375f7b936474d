use std::sync::Arc;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use pdfconv_core::{normalize_extension, BatchSummary, ConversionJob, ConversionService, JobOptions};
use pdfconv_engine::{
    create_output_folder, open_folder_in_file_browser, FileScanner, OfficeConverter,
    SerializedWorker, SofficeBackend,
};

use crate::cli::Cli;
use crate::config::AppConfig;

/// Service with the three office converters on a LibreOffice backend.
pub(crate) fn office_service(config: &AppConfig) -> ConversionService {
    let backend = Arc::new(SofficeBackend::new(config.soffice_settings()));
    let mut service = ConversionService::new();
    for converter in OfficeConverter::for_all_apps(backend) {
        service.register_converter(Arc::new(converter));
    }
    service
}

/// Converts the folder named on the command line.
///
/// Returns `None` when the folder holds nothing to convert.
pub(crate) fn run(
    cli: &Cli,
    config: &AppConfig,
    service: ConversionService,
) -> anyhow::Result<Option<BatchSummary>> {
    if !cli.folder.is_dir() {
        bail!("not a folder: {}", cli.folder.display());
    }

    let extensions = selected_extensions(&cli.types, &service)?;
    let files = FileScanner::new(&extensions).scan_folder(&cli.folder);
    if files.is_empty() {
        println!(
            "No convertible files ({}) found in {}",
            extensions.join(", "),
            cli.folder.display()
        );
        return Ok(None);
    }
    println!("Found {} file(s) to convert", files.len());

    let output_folder = create_output_folder(
        &cli.folder,
        Some(&config.output_folder_name),
        config.use_timestamp,
    )
    .context("failed to create output folder")?;

    let options: JobOptions = cli.options.iter().cloned().collect();
    let jobs = files
        .iter()
        .map(|file| {
            service
                .create_job_with_options(file, Some(&output_folder), None, options.clone())
                .with_context(|| format!("cannot create job for {}", file.display()))
        })
        .collect::<anyhow::Result<Vec<ConversionJob>>>()?;

    let summary = convert_on_worker(Arc::new(service), jobs, config)?;
    println!("{summary}");
    println!("Output folder: {}", output_folder.display());

    if cli.open && !open_folder_in_file_browser(&output_folder) {
        engine_warn!("Could not open {}", output_folder.display());
    }
    Ok(Some(summary))
}

/// Runs the whole batch as one task so office sessions stay on the worker thread.
fn convert_on_worker(
    service: Arc<ConversionService>,
    jobs: Vec<ConversionJob>,
    config: &AppConfig,
) -> anyhow::Result<BatchSummary> {
    let worker = SerializedWorker::new(config.worker_settings());
    worker.start()?;

    engine_info!("Submitting batch of {} job(s)", jobs.len());
    let results = worker.submit_with_receiver(move || {
        service.convert_batch_with_progress(&jobs, |progress| {
            let status = if progress.result.is_success() { "ok" } else { "FAILED" };
            println!(
                "Converting... ({}/{}) {} [{status}]",
                progress.completed,
                progress.total,
                progress.job.display_name()
            );
        })
    });
    let outcome = results.recv();
    worker.stop(config.stop_timeout());

    let results = outcome
        .context("worker exited without reporting results")?
        .context("batch conversion crashed")?;
    Ok(BatchSummary::from_results(&results))
}

/// Normalized extensions to scan for. Empty `requested` selects every
/// supported type; unknown types are skipped with a warning.
fn selected_extensions(
    requested: &[String],
    service: &ConversionService,
) -> anyhow::Result<Vec<String>> {
    let supported = service.supported_extensions();
    if requested.is_empty() {
        return Ok(supported);
    }

    let mut selected = Vec::new();
    for ext in requested.iter().filter(|ext| !ext.trim().is_empty()) {
        let ext = normalize_extension(ext);
        if !supported.contains(&ext) {
            engine_warn!("Ignoring unsupported type {}", ext);
            continue;
        }
        if !selected.contains(&ext) {
            selected.push(ext);
        }
    }
    if selected.is_empty() {
        bail!(
            "none of the requested types are supported (supported: {})",
            supported.join(", ")
        );
    }
    Ok(selected)
}

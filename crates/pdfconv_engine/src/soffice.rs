//! Headless LibreOffice (`soffice`) backend.
//!
//! Each session gets a throw-away user profile so that a stale lock or a
//! crashed instance from an earlier job cannot leak into the next one. The
//! export runs as a child process that is killed, together with everything it
//! forked, once the job timeout elapses.

use std::fs::{self, File};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_warn};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use crate::automation::{
    AppSession, AutomationError, DocumentHandle, ExportSettings, FilterValue, OfficeApp,
    OfficeBackend,
};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_FILENAME: &str = "soffice-stderr.log";
const HEADLESS_ARGS: &[&str] = &[
    "--headless",
    "--invisible",
    "--nologo",
    "--norestore",
    "--nolockcheck",
    "--nodefault",
];

#[derive(Debug, Clone)]
pub struct SofficeSettings {
    /// `soffice` executable; a bare name is looked up on `PATH`.
    pub program: PathBuf,
    /// Upper bound for one export (and for the startup probe).
    pub job_timeout: Duration,
}

impl Default for SofficeSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("soffice"),
            job_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SofficeBackend {
    settings: SofficeSettings,
}

impl SofficeBackend {
    pub fn new(settings: SofficeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SofficeSettings {
        &self.settings
    }
}

impl OfficeBackend for SofficeBackend {
    fn launch(&self, app: OfficeApp) -> Result<Box<dyn AppSession>, AutomationError> {
        let program = &self.settings.program;
        let mut probe = Command::new(program);
        probe
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let status = run_with_timeout(probe, self.settings.job_timeout).map_err(|err| {
            AutomationError::Unavailable(format!("cannot run {}: {err}", program.display()))
        })?;
        if !status.success() {
            return Err(AutomationError::Unavailable(format!(
                "{} --version exited with {status}",
                program.display()
            )));
        }

        let profile = tempfile::Builder::new()
            .prefix("pdfconv-profile-")
            .tempdir()
            .map_err(|err| {
                AutomationError::Unavailable(format!("cannot create user profile: {err}"))
            })?;
        engine_debug!("Launched {} session with profile {:?}", app, profile.path());

        Ok(Box::new(SofficeSession {
            app,
            program: program.clone(),
            job_timeout: self.settings.job_timeout,
            profile: Some(profile),
            _thread_bound: PhantomData,
        }))
    }
}

struct SofficeSession {
    app: OfficeApp,
    program: PathBuf,
    job_timeout: Duration,
    profile: Option<TempDir>,
    // Keeps the session `!Send`.
    _thread_bound: PhantomData<*const ()>,
}

impl AppSession for SofficeSession {
    fn open_document<'s>(
        &'s mut self,
        path: &Path,
    ) -> Result<Box<dyn DocumentHandle + 's>, AutomationError> {
        let open_error = |reason: String| AutomationError::Open {
            path: path.to_path_buf(),
            reason,
        };
        let metadata = fs::metadata(path).map_err(|err| open_error(err.to_string()))?;
        if !metadata.is_file() {
            return Err(open_error("not a regular file".to_string()));
        }
        // Read-only probe; the export never writes to the input.
        File::open(path).map_err(|err| open_error(err.to_string()))?;

        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| open_error("session already closed".to_string()))?;
        let profile_url = file_url(profile.path());
        let staging = tempfile::Builder::new()
            .prefix("pdfconv-export-")
            .tempdir()
            .map_err(|err| open_error(format!("cannot create staging directory: {err}")))?;

        Ok(Box::new(SofficeDocument {
            session: &*self,
            profile_url,
            input: path.to_path_buf(),
            staging: Some(staging),
            filter_options: None,
        }))
    }

    fn quit(&mut self) -> Result<(), AutomationError> {
        match self.profile.take() {
            Some(profile) => profile
                .close()
                .map_err(|err| AutomationError::Cleanup(format!("remove user profile: {err}"))),
            None => Ok(()),
        }
    }
}

struct SofficeDocument<'s> {
    session: &'s SofficeSession,
    profile_url: String,
    input: PathBuf,
    staging: Option<TempDir>,
    filter_options: Option<String>,
}

impl DocumentHandle for SofficeDocument<'_> {
    fn configure_export(&mut self, settings: &ExportSettings) -> Result<(), AutomationError> {
        self.filter_options = filter_options_json(settings)?;
        Ok(())
    }

    fn export_pdf(&mut self, output: &Path) -> Result<(), AutomationError> {
        let staging = self
            .staging
            .as_ref()
            .ok_or_else(|| AutomationError::Export("document already closed".to_string()))?;
        let out_dir = staging.path().join("out");
        fs::create_dir_all(&out_dir)?;
        let stderr_path = staging.path().join(STDERR_FILENAME);
        let stderr = File::create(&stderr_path)?;

        let filter = match &self.filter_options {
            Some(options) => format!("pdf:{}:{}", self.session.app.pdf_filter(), options),
            None => format!("pdf:{}", self.session.app.pdf_filter()),
        };

        let mut command = Command::new(&self.session.program);
        command
            .args(HEADLESS_ARGS)
            .arg(format!("-env:UserInstallation={}", self.profile_url))
            .arg("--convert-to")
            .arg(&filter)
            .arg("--outdir")
            .arg(&out_dir)
            .arg(&self.input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));
        engine_debug!("Running {:?}", command);

        let status = run_with_timeout(command, self.session.job_timeout)?;
        let diagnostics = read_diagnostics(&stderr_path);
        if !status.success() {
            return Err(AutomationError::Export(format!(
                "{} exited with {status}: {diagnostics}",
                self.session.program.display()
            )));
        }

        let stem = self
            .input
            .file_stem()
            .ok_or_else(|| AutomationError::Export("input has no file name".to_string()))?;
        let produced = out_dir.join(format!("{}.pdf", stem.to_string_lossy()));
        if !produced.is_file() {
            return Err(AutomationError::Export(format!(
                "no PDF was produced for {}: {diagnostics}",
                self.input.display()
            )));
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(&produced, output)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AutomationError> {
        match self.staging.take() {
            Some(staging) => staging
                .close()
                .map_err(|err| AutomationError::Cleanup(format!("remove staging: {err}"))),
            None => Ok(()),
        }
    }
}

/// LibreOffice JSON filter options, e.g.
/// `{"PageRange":{"type":"string","value":"1-3"}}`.
fn filter_options_json(settings: &ExportSettings) -> Result<Option<String>, AutomationError> {
    if settings.is_empty() {
        return Ok(None);
    }
    let mut options = Map::new();
    for (name, value) in settings.iter() {
        let (kind, text) = match value {
            FilterValue::Bool(flag) => ("boolean", flag.to_string()),
            FilterValue::Text(text) => {
                if name == "PageRange" {
                    validate_page_range(text)?;
                }
                ("string", text.clone())
            }
        };
        options.insert(name.to_string(), json!({ "type": kind, "value": text }));
    }
    Ok(Some(Value::Object(options).to_string()))
}

fn validate_page_range(range: &str) -> Result<(), AutomationError> {
    let valid = !range.trim().is_empty()
        && range
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | ' '));
    if valid {
        Ok(())
    } else {
        Err(AutomationError::InvalidSetting {
            name: "PageRange".to_string(),
            reason: format!("expected digits, ',' and '-', got {range:?}"),
        })
    }
}

/// Runs `command`, killing its whole process tree when `timeout` elapses.
///
/// `soffice` is a launcher that forks the real converter, so killing only the
/// direct child would leave the converter running.
fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ExitStatus, AutomationError> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn()?;
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            kill_process_tree(&mut child);
            let _ = child.wait();
            return Err(AutomationError::TimedOut(timeout));
        }
        thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own process group (see `run_with_timeout`).
    let group = Pid::from_raw(child.id() as i32);
    if let Err(err) = killpg(group, Signal::SIGKILL) {
        engine_warn!("Failed to kill process group {}: {}", group, err);
        if let Err(err) = child.kill() {
            engine_warn!("Failed to kill timed-out process {}: {}", child.id(), err);
        }
    }
}

#[cfg(windows)]
fn kill_process_tree(child: &mut Child) {
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &child.id().to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if !matches!(status, Ok(status) if status.success()) {
        engine_warn!("taskkill failed for process {}: {:?}", child.id(), status);
        if let Err(err) = child.kill() {
            engine_warn!("Failed to kill timed-out process {}: {}", child.id(), err);
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(child: &mut Child) {
    if let Err(err) = child.kill() {
        engine_warn!("Failed to kill timed-out process {}: {}", child.id(), err);
    }
}

fn read_diagnostics(path: &Path) -> String {
    let text = fs::read_to_string(path).unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        "no diagnostics".to_string()
    } else {
        text.to_string()
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), AutomationError> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    if fs::rename(from, to).is_err() {
        // Staging may live on another volume.
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

fn file_url(path: &Path) -> String {
    let text = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace('%', "%25")
        .replace(' ', "%20");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}

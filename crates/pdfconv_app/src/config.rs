//! Layered application settings.
//!
//! Precedence, lowest first: built-in defaults, the RON file, environment
//! variables, command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::{parse_level, LogOptions};
use pdfconv_engine::{SofficeSettings, WorkerSettings, DEFAULT_OUTPUT_FOLDER_NAME};
use serde::Deserialize;

use crate::cli::Cli;

const DEFAULT_CONFIG_FILE: &str = "pdfconv.ron";
const ENV_LOG_LEVEL: &str = "PDFCONVERTER_LOG_LEVEL";
const ENV_LOG_FILE: &str = "PDFCONVERTER_LOG_FILE";
const ENV_SOFFICE: &str = "PDFCONVERTER_SOFFICE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub soffice_path: PathBuf,
    pub job_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub output_folder_name: String,
    pub use_timestamp: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            soffice_path: PathBuf::from("soffice"),
            job_timeout_secs: 300,
            stop_timeout_secs: 5,
            poll_interval_ms: 500,
            output_folder_name: DEFAULT_OUTPUT_FOLDER_NAME.to_string(),
            use_timestamp: true,
        }
    }
}

impl AppConfig {
    /// Resolves the effective settings for one run of the binary.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_ron(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Applies environment overrides; `lookup` returns a variable's value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(file) = non_empty(ENV_LOG_FILE) {
            self.log_file = Some(PathBuf::from(file));
        }
        if let Some(program) = non_empty(ENV_SOFFICE) {
            self.soffice_path = PathBuf::from(program);
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if let Some(file) = &cli.log_file {
            self.log_file = Some(file.clone());
        }
        if let Some(program) = &cli.soffice {
            self.soffice_path = program.clone();
        }
        if let Some(secs) = cli.timeout {
            self.job_timeout_secs = secs;
        }
        if let Some(name) = &cli.output_name {
            self.output_folder_name = name.clone();
        }
        if cli.no_timestamp {
            self.use_timestamp = false;
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: parse_level(&self.log_level),
            file: self.log_file.clone(),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn soffice_settings(&self) -> SofficeSettings {
        SofficeSettings {
            program: self.soffice_path.clone(),
            job_timeout: Duration::from_secs(self.job_timeout_secs.max(1)),
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

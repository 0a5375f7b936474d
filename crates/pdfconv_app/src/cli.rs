use std::path::PathBuf;

use clap::Parser;

/// Convert every Office document in a folder to PDF.
#[derive(Debug, Clone, Parser)]
#[command(name = "pdfconv", version, about)]
pub(crate) struct Cli {
    /// Folder containing the documents to convert (not searched recursively).
    pub folder: PathBuf,

    /// Only convert these extensions, comma separated (e.g. `docx,xlsx`).
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    pub types: Vec<String>,

    /// Name of the output folder created inside FOLDER.
    #[arg(long, value_name = "NAME")]
    pub output_name: Option<String>,

    /// Do not append `_YYYYmmdd_HHMMSS` to the output folder name.
    #[arg(long)]
    pub no_timestamp: bool,

    /// Open the output folder in the file browser when done.
    #[arg(long)]
    pub open: bool,

    /// LibreOffice executable used for conversion.
    #[arg(long, value_name = "PATH")]
    pub soffice: Option<PathBuf>,

    /// Per-document timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Terminal log level: error, warn, info, debug or trace.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also write a debug-level log to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// RON configuration file. Defaults to `./pdfconv.ron` when present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Export option applied to every job, e.g. `pages=1-3` or `fit_to_page=false`.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, String)>,
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Appends log lines to `<dir>/<YYYY-MM-DD>.log` for the current local day.
///
/// The file is opened per write, so a long-running update loop rolls over to
/// a new file at midnight without any extra bookkeeping.
#[derive(Debug, Clone)]
pub struct DailyLogWriter {
    dir: PathBuf,
}

impl DailyLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log file path for a given day
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.log", date.format("%Y-%m-%d")))
    }
}

impl<'a> MakeWriter<'a> for DailyLogWriter {
    type Writer = Box<dyn io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let path = self.path_for(Local::now().date_naive());
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Box::new(file),
            // Unwritable log dir drops the line
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// Install the global tracing subscriber writing to daily files in `log_dir`.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `info`, or
/// `debug` when `debug` is set.
pub fn init(log_dir: &Path, debug: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("poke={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(DailyLogWriter::new(log_dir))
        .with_ansi(false)
        .try_init()
}

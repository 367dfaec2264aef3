//! Log output setup

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// Initialise `env_logger`. `RUST_LOG` wins over the defaults; `verbose`
/// turns on debug output for this crate.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_filter = if verbose { "info,sheets_etl=debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder.try_init().context("Failed to initialize logging")?;
    Ok(())
}

/// Writes every log line to stderr and the log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

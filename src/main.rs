use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use batchlog::config::Config;
use batchlog::logging::{self, Logger, Severity, TracingConsole};

const USAGE: &str = "usage: batchlog [LOG_DIR] [LEVEL]";

/// Pipe stdin through a logger: every line is echoed to stderr and persisted
/// into rotating files under LOG_DIR (or the configured `log_dir`).
fn main() -> Result<()> {
    logging::init_console_tracing("info");

    let mut args = std::env::args().skip(1);
    let mut config = Config::load().context("Failed to load config")?;

    if let Some(dir) = args.next() {
        if dir == "-h" || dir == "--help" {
            println!("{}", USAGE);
            return Ok(());
        }
        config.log_dir = Some(PathBuf::from(dir));
    }

    let level = match args.next() {
        Some(level) => level.parse::<Severity>().context(USAGE)?,
        None => Severity::Info,
    };

    if let Some(dir) = config.expanded_log_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    let logger = Logger::from_config(&config, Arc::new(TracingConsole))
        .context("Invalid logger configuration")?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        logger.log(level, "stdin", &line, None);
    }

    logger.shutdown();
    Ok(())
}

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "ecourts.log";

/// Crate-level filter directive for the chosen verbosity
fn crate_directive(verbose: bool) -> &'static str {
    if verbose {
        "ecourts_scraper=debug"
    } else {
        "ecourts_scraper=info"
    }
}

/// `RUST_LOG` plus the crate directive and a warn floor for dependencies
fn build_filter(verbose: bool) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive(crate_directive(verbose).parse()?)
        .add_directive("warn".parse()?))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).context(format!("Failed to create log directory {}", dir.display()))?;
    }
    File::create(path).context(format!("Failed to create log file {}", path.display()))
}

/// Console logging, plus a plain-text copy in `log_file` when one is given
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(&path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose)?)
        .with(fmt::layer().with_target(verbose).with_span_events(FmtSpan::CLOSE))
        .with(file_layer)
        .init();

    Ok(())
}

/// `ecourts.log` under the platform data directory, or `./logs` without one
pub fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("in", "ecourts-scraper", "ecourts-scraper")
        .map(|dirs| dirs.data_dir().join(LOG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from("logs").join(LOG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builds_for_both_levels() {
        for verbose in [true, false] {
            tokio_test::assert_ok!(build_filter(verbose));
        }
        assert!(default_log_file().ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_log_file_directories_are_created() {
        let dir = std::env::temp_dir().join(format!("ecourts-log-test-{}", std::process::id()));
        let path = dir.join("nested").join(LOG_FILE_NAME);

        tokio_test::assert_ok!(open_log_file(&path));
        assert!(path.exists());

        fs::remove_dir_all(dir).ok();
    }
}

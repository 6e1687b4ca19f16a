use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LODCRM_LOG";
const LOG_FILE_NAME: &str = "lodcrm.log";

const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV).ok().as_deref())
}

/// Unset, blank or unparsable directives fall back to `info`.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Default log file location inside the per-user data directory.
pub fn default_log_path() -> Option<PathBuf> {
    crate::config::data_dir().map(|dir| dir.join(LOG_FILE_NAME))
}

/// Log to a file; the terminal is owned by the UI while it runs.
pub fn init_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {}", err))?;
    Ok(())
}

/// Log to stderr, used by the one-shot subcommands so stdout stays clean.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(filter_from(None).to_string(), "info");
        assert_eq!(filter_from(Some("  ")).to_string(), "info");
        assert_eq!(filter_from(Some("lodcrm=notalevel")).to_string(), "info");
    }

    #[test]
    fn test_directives_are_honoured() {
        assert_eq!(filter_from(Some("lodcrm=debug")).to_string(), "lodcrm=debug");
        assert_eq!(filter_from(Some(" warn ")).to_string(), "warn");
    }

    #[test]
    fn test_init_file_creates_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lodcrm.log");
        // A subscriber may already be installed by another test.
        let _ = init_file(&path);
        assert!(path.exists());
    }
}

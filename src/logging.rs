//! File logging and log archival
//!
//! Each run logs to `latest.log` in the data directory. On exit the log is
//! copied to `logs/MM-dd-yyyy.log`, with a `_N` suffix when that day already
//! has an archive.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{data_dir, Settings};

const LOG_FILE: &str = "latest.log";
const ARCHIVE_DIR: &str = "logs";

fn log_path() -> PathBuf {
    data_dir()
        .map(|dir| dir.join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE))
}

/// Level selected by the settings flags
pub fn max_level(settings: &Settings) -> Level {
    if settings.verbose {
        Level::TRACE
    } else if settings.debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Log to `latest.log` in the data directory, replacing the previous run's log.
///
/// `RUST_LOG` overrides the level picked from the settings.
pub fn init(settings: &Settings) {
    let log_path = log_path();

    let log_file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(max_level(settings).as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Copy this run's log into the archive directory under today's date.
pub fn archive() -> io::Result<PathBuf> {
    let log = log_path();
    let dir = log
        .parent()
        .map(|parent| parent.join(ARCHIVE_DIR))
        .unwrap_or_else(|| PathBuf::from(ARCHIVE_DIR));
    archive_to(&log, &dir, Local::now().date_naive())
}

/// Copy `log` to `dir/MM-dd-yyyy.log`, or `MM-dd-yyyy_N.log` for the Nth
/// duplicate of the day. Returns the archive path.
pub fn archive_to(log: &Path, dir: &Path, date: NaiveDate) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let stem = date.format("%m-%d-%Y").to_string();
    let mut target = dir.join(format!("{}.log", stem));
    let mut n = 1;
    while target.exists() {
        target = dir.join(format!("{}_{}.log", stem, n));
        n += 1;
    }

    fs::copy(log, &target)?;
    debug!("Archived {} to {}", log.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_max_level_follows_flags() {
        let mut settings = Settings::default();
        assert_eq!(max_level(&settings), Level::INFO);
        settings.debug = true;
        assert_eq!(max_level(&settings), Level::DEBUG);
        settings.verbose = true;
        assert_eq!(max_level(&settings), Level::TRACE);
    }

    #[test]
    fn test_archive_uses_date_name() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join(LOG_FILE);
        fs::write(&log, "first run\n").unwrap();

        let dir = tmp.path().join(ARCHIVE_DIR);
        let target = archive_to(&log, &dir, date()).unwrap();

        assert_eq!(target, dir.join("03-07-2026.log"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "first run\n");
    }

    #[test]
    fn test_archive_numbers_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join(LOG_FILE);
        let dir = tmp.path().join(ARCHIVE_DIR);

        for run in ["one", "two", "three"] {
            fs::write(&log, run).unwrap();
            archive_to(&log, &dir, date()).unwrap();
        }

        assert_eq!(fs::read_to_string(dir.join("03-07-2026.log")).unwrap(), "one");
        assert_eq!(fs::read_to_string(dir.join("03-07-2026_1.log")).unwrap(), "two");
        assert_eq!(fs::read_to_string(dir.join("03-07-2026_2.log")).unwrap(), "three");
    }

    #[test]
    fn test_archive_missing_log_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = archive_to(&tmp.path().join("absent.log"), tmp.path(), date());
        assert!(result.is_err());
    }
}

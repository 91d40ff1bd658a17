//! Shared logging setup for the finflow binary.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "finflow=info,finflow_ingest=info";
const QUIET_CONSOLE_FILTER: &str = "warn";
const LOG_ROTATION: Rotation = Rotation {
    keep: 5,
    max_bytes: 10 * 1024 * 1024,
};

/// Logging configuration for one process.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let log_file = SizeRotatedFile::open(log_dir, config.app_name, LOG_ROTATION)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let console_filter = if config.verbose {
        default_filter()
    } else {
        EnvFilter::new(QUIET_CONSOLE_FILTER)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_filter(default_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// `RUST_LOG` if set and valid, otherwise the finflow defaults.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Finflow home directory: `$FINFLOW_HOME`, else `~/.finflow`
pub fn finflow_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("FINFLOW_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".finflow"))
}

/// Logs directory: `<finflow home>/logs`
pub fn logs_dir() -> Result<PathBuf> {
    Ok(finflow_home()?.join("logs"))
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// How many log files to keep and how large each may grow.
#[derive(Debug, Clone, Copy)]
struct Rotation {
    keep: usize,
    max_bytes: u64,
}

/// `<stem>.log`, rolled over to `<stem>.log.1` .. `<stem>.log.<keep - 1>`
/// once the next write would push it past `max_bytes`.
struct SizeRotatedFile {
    dir: PathBuf,
    stem: String,
    rotation: Rotation,
    file: File,
    written: u64,
}

impl SizeRotatedFile {
    fn open(dir: PathBuf, stem: &str, rotation: Rotation) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let stem = sanitize_name(stem);
        let rotation = Rotation {
            keep: rotation.keep.max(1),
            ..rotation
        };
        let (file, written) = open_append(&log_path(&dir, &stem, 0))?;
        let mut log = Self {
            dir,
            stem,
            rotation,
            file,
            written,
        };
        if log.written > log.rotation.max_bytes {
            log.roll_over()?;
        }
        Ok(log)
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let last = self.rotation.keep - 1;
        for index in (0..=last).rev() {
            let path = log_path(&self.dir, &self.stem, index);
            if !path.exists() {
                continue;
            }
            if index == last {
                fs::remove_file(&path)?;
            } else {
                fs::rename(&path, log_path(&self.dir, &self.stem, index + 1))?;
            }
        }
        let (file, written) = open_append(&log_path(&self.dir, &self.stem, 0))?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

/// `<stem>.log` for index 0, `<stem>.log.<index>` otherwise.
fn log_path(dir: &Path, stem: &str, index: usize) -> PathBuf {
    match index {
        0 => dir.join(format!("{}.log", stem)),
        n => dir.join(format!("{}.log.{}", stem, n)),
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

impl Write for SizeRotatedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.rotation.max_bytes {
            self.roll_over()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("finflow"), "finflow");
        assert_eq!(sanitize_name("fin flow/../x"), "fin_flow____x");
    }

    fn rotation(keep: usize, max_bytes: u64) -> Rotation {
        Rotation { keep, max_bytes }
    }

    #[test]
    fn test_log_path() {
        let dir = Path::new("/logs");
        assert_eq!(log_path(dir, "finflow", 0), PathBuf::from("/logs/finflow.log"));
        assert_eq!(log_path(dir, "finflow", 2), PathBuf::from("/logs/finflow.log.2"));
    }

    #[test]
    fn test_appender_rotates_when_full() {
        let tmp = TempDir::new().unwrap();
        let mut appender =
            SizeRotatedFile::open(tmp.path().to_path_buf(), "finflow", rotation(3, 10)).unwrap();

        appender.write_all(b"0123456789").unwrap();
        appender.write_all(b"abcdef").unwrap();
        appender.write_all(b"ghijklmnop").unwrap();
        appender.flush().unwrap();

        let read = |name: &str| fs::read_to_string(tmp.path().join(name)).unwrap();
        assert_eq!(read("finflow.log"), "ghijklmnop");
        assert_eq!(read("finflow.log.1"), "abcdef");
        assert_eq!(read("finflow.log.2"), "0123456789");
    }

    #[test]
    fn test_appender_keeps_at_most_max_files() {
        let tmp = TempDir::new().unwrap();
        let mut appender =
            SizeRotatedFile::open(tmp.path().to_path_buf(), "finflow", rotation(2, 4)).unwrap();

        for chunk in [b"aaaa", b"bbbb", b"cccc"] {
            appender.write_all(chunk).unwrap();
        }
        appender.flush().unwrap();

        let mut names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["finflow.log", "finflow.log.1"]);
        assert_eq!(fs::read_to_string(tmp.path().join("finflow.log.1")).unwrap(), "bbbb");
    }

    #[test]
    fn test_appender_resumes_existing_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("finflow.log"), "abc").unwrap();

        let mut appender =
            SizeRotatedFile::open(tmp.path().to_path_buf(), "finflow", rotation(3, 1024)).unwrap();
        appender.write_all(b"def").unwrap();
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("finflow.log")).unwrap(), "abcdef");
    }

    #[test]
    fn test_single_file_starts_over() {
        let tmp = TempDir::new().unwrap();
        let mut appender =
            SizeRotatedFile::open(tmp.path().to_path_buf(), "finflow", rotation(1, 4)).unwrap();

        appender.write_all(b"aaaa").unwrap();
        appender.write_all(b"bb").unwrap();
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("finflow.log")).unwrap(), "bb");
        assert!(!tmp.path().join("finflow.log.1").exists());
    }
}

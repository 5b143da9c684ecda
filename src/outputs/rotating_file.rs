//! Size-rotated log file with timestamped backups
//!
//! The active file is renamed to `<stem>-<timestamp>.<ext>` once the next
//! write would push it past the size limit. Backups beyond the count limit,
//! or older than the age limit, are removed after each rotation. Rotated
//! files can be gzip-compressed in place (`<backup>.gz`).

use crate::core::error::{LoggerError, Result};
use chrono::{Local, NaiveDateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const MEGABYTE: u64 = 1024 * 1024;
const DAY_SECS: u64 = 24 * 3600;
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.6f";

/// Whether `name` is `<stem>-<timestamp>[.N][.<ext>][.gz]` as written by rotation
fn is_backup_name(name: &str, stem: &str, ext: &str) -> bool {
    let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    let rest = rest.strip_suffix(".gz").unwrap_or(rest);
    let stamp = if ext.is_empty() {
        Some(rest)
    } else {
        rest.strip_suffix(ext).and_then(|r| r.strip_suffix('.'))
    };
    let Some(stamp) = stamp else {
        return false;
    };

    let parses = |s: &str| NaiveDateTime::parse_from_str(s, BACKUP_TIME_FORMAT).is_ok();
    if parses(stamp) {
        return true;
    }
    // collision suffix
    match stamp.rsplit_once('.') {
        Some((head, n)) => !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) && parses(head),
        None => false,
    }
}

/// Parameters of a [`RotatingWriter`]
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::outputs::RotationSettings;
///
/// let settings = RotationSettings::new("logs/api.log")
///     .with_max_size_mb(50)
///     .with_max_backups(10)
///     .with_compression(true);
/// assert_eq!(settings.max_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSettings {
    pub path: PathBuf,
    /// Size limit of the active file; 0 disables size rotation
    pub max_bytes: u64,
    /// Backups older than this are pruned; zero keeps them regardless of age
    pub max_age: Duration,
    /// Number of backups kept; 0 keeps them all
    pub max_backups: usize,
    pub compress: bool,
    /// Name backups with local time instead of UTC
    pub local_time: bool,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/app.log"),
            max_bytes: 100 * MEGABYTE,
            max_age: Duration::from_secs(7 * DAY_SECS),
            max_backups: 3,
            compress: false,
            local_time: false,
        }
    }
}

impl RotationSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_bytes = megabytes.saturating_mul(MEGABYTE);
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_max_age_days(mut self, days: u64) -> Self {
        self.max_age = Duration::from_secs(days.saturating_mul(DAY_SECS));
        self
    }

    #[must_use]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use]
    pub fn with_local_time(mut self, enabled: bool) -> Self {
        self.local_time = enabled;
        self
    }

    fn stem_and_ext(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("app")
            .to_string();
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        (stem, ext)
    }
}

/// Append-only file writer that rotates by size
pub struct RotatingWriter {
    settings: RotationSettings,
    file: Option<File>,
    size: u64,
}

impl RotatingWriter {
    /// Open (or create) the active file, creating parent directories
    pub fn open(settings: RotationSettings) -> Result<Self> {
        let file = open_append(&settings.path)?;
        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("cannot stat '{}'", settings.path.display()),
                    e,
                )
            })?
            .len();

        Ok(Self {
            settings,
            file: Some(file),
            size,
        })
    }

    pub fn settings(&self) -> &RotationSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    /// Size of the active file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Write a whole buffer, rotating first when it would not fit
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let len = bytes.len() as u64;
        if self.settings.max_bytes > 0
            && self.size > 0
            && self.size + len > self.settings.max_bytes
        {
            if let Err(e) = self.rotate() {
                eprintln!(
                    "[LOGGER WARNING] Rotation of '{}' failed: {}. Continuing with current file.",
                    self.settings.path.display(),
                    e
                );
                if self.file.is_none() {
                    self.file = Some(open_append(&self.settings.path)?);
                }
            }
        }

        let file = self.file.as_mut().ok_or_else(|| {
            LoggerError::other(format!(
                "log file '{}' is closed",
                self.settings.path.display()
            ))
        })?;
        file.write_all(bytes).map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("cannot write '{}'", self.settings.path.display()),
                e,
            )
        })?;
        self.size += len;
        Ok(bytes.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Release the file handle; later writes fail
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    /// Move the active file to a backup and start a fresh one
    pub fn rotate(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.settings.path.exists() {
            let backup = self.next_backup_path();
            fs::rename(&self.settings.path, &backup).map_err(|e| {
                LoggerError::io_operation(
                    "rotating log file",
                    format!(
                        "cannot rename '{}' to '{}'",
                        self.settings.path.display(),
                        backup.display()
                    ),
                    e,
                )
            })?;

            if self.settings.compress {
                compress_file(&backup)?;
            }
        }

        self.file = Some(open_append(&self.settings.path)?);
        self.size = 0;

        if let Err(e) = self.prune() {
            eprintln!(
                "[LOGGER WARNING] Failed to prune backups of '{}': {}",
                self.settings.path.display(),
                e
            );
        }
        Ok(())
    }

    /// Existing backups, newest first
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let dir = match self.settings.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let (stem, ext) = self.settings.stem_and_ext();

        let mut found = Vec::new();
        for item in fs::read_dir(&dir)? {
            let item = item?;
            let file_name = item.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if is_backup_name(file_name, &stem, &ext) {
                found.push(item.path());
            }
        }

        found.sort();
        found.reverse();
        Ok(found)
    }

    fn next_backup_path(&self) -> PathBuf {
        let stamp = if self.settings.local_time {
            Local::now().format(BACKUP_TIME_FORMAT).to_string()
        } else {
            Utc::now().format(BACKUP_TIME_FORMAT).to_string()
        };
        let (stem, ext) = self.settings.stem_and_ext();
        let dot_ext = if ext.is_empty() { String::new() } else { format!(".{}", ext) };

        let mut candidate = self.settings.path.with_file_name(format!("{}-{}{}", stem, stamp, dot_ext));
        let mut attempt = 1;
        while candidate.exists() || gz_path(&candidate).exists() {
            candidate = self
                .settings
                .path
                .with_file_name(format!("{}-{}.{}{}", stem, stamp, attempt, dot_ext));
            attempt += 1;
        }
        candidate
    }

    /// Remove backups beyond the count limit and past the age limit
    fn prune(&self) -> Result<()> {
        let backups = self.backups()?;
        let now = SystemTime::now();

        for (idx, path) in backups.iter().enumerate() {
            let over_count = self.settings.max_backups > 0 && idx >= self.settings.max_backups;
            let too_old = !self.settings.max_age.is_zero()
                && fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > self.settings.max_age);

            if over_count || too_old {
                fs::remove_file(path).map_err(|e| {
                    LoggerError::io_operation(
                        "pruning log backups",
                        format!("cannot remove '{}'", path.display()),
                        e,
                    )
                })?;
            }
        }
        Ok(())
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    format!("cannot create '{}'", parent.display()),
                    e,
                )
            })?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "opening log file",
                format!("cannot open '{}'", path.display()),
                e,
            )
        })
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip a file next to itself, removing the original only on success
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, BufWriter};

    let gz = gz_path(path);
    let mut tmp = gz.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = (|| -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let writer = BufWriter::with_capacity(64 * 1024, File::create(&tmp)?);
        let mut encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&tmp, &gz)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::io_operation(
            "compressing log backup",
            format!("cannot compress '{}'", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed '{}' but could not remove the original: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

//! Rolling log file writer
//!
//! Size-based rotation for the optional `--log-file` sink. When the
//! current file would exceed the size cap it is renamed to `<name>.1`
//! (shifting older rotations up) and a fresh file is opened.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (10MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated files kept on disk
pub const DEFAULT_MAX_FILES: usize = 5;

/// A log file writer that rotates by size.
///
/// Files are suffixed numerically: `api.log`, `api.log.1`, `api.log.2`,
/// with the highest suffix deleted once the retention cap is reached.
#[derive(Debug)]
pub struct SizeBasedRollingWriter {
    base_path: PathBuf,
    file: Option<File>,
    current_size: u64,
    max_size: u64,
    max_files: usize,
}

impl SizeBasedRollingWriter {
    /// Open (or create) the log file at `path`.
    ///
    /// The parent directory is created if missing; an existing file is
    /// appended to, with its current size counted toward the cap.
    pub fn new(path: impl AsRef<Path>, max_size: u64, max_files: usize) -> io::Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let current_size = fs::metadata(&base_path).map(|m| m.len()).unwrap_or(0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&base_path)?;

        Ok(Self {
            base_path,
            file: Some(file),
            current_size,
            max_size,
            max_files,
        })
    }

    /// Open with the default 10MB / 5 file policy
    pub fn with_defaults(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(path, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILES)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;

        // Shift rotations up, dropping the oldest at the cap
        for i in (1..self.max_files).rev() {
            let from = self.rotated_path(i);
            let to = self.rotated_path(i + 1);
            if from.exists() {
                if i + 1 >= self.max_files {
                    fs::remove_file(&from).ok();
                } else {
                    fs::rename(&from, &to).ok();
                }
            }
        }

        if self.base_path.exists() {
            fs::rename(&self.base_path, self.rotated_path(1))?;
        }

        self.file = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.base_path)?,
        );
        self.current_size = 0;

        Ok(())
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        path.set_file_name(format!("{filename}.{index}"));
        path
    }
}

impl Write for SizeBasedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        match self.file.as_mut() {
            Some(file) => {
                let written = file.write(buf)?;
                self.current_size += written as u64;
                Ok(written)
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "log file not open")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writer_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.log");

        let writer = SizeBasedRollingWriter::with_defaults(&path).unwrap();
        assert!(path.exists());
        drop(writer);
    }

    #[test]
    fn test_writer_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.log");

        let mut writer = SizeBasedRollingWriter::with_defaults(&path).unwrap();
        writer.write_all(b"{\"event\":\"test\"}\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"event\":\"test\""));
    }

    #[test]
    fn test_writer_rotates_at_cap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.log");

        let mut writer = SizeBasedRollingWriter::new(&path, 100, 3).unwrap();

        for i in 0..10 {
            writeln!(writer, "line {i}: rotation trigger padding padding").unwrap();
        }
        writer.flush().unwrap();

        assert!(dir.path().join("api.log.1").exists(), "rotated file should exist");
    }

    #[test]
    fn test_retention_cap_drops_oldest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.log");

        let mut writer = SizeBasedRollingWriter::new(&path, 40, 2).unwrap();
        for i in 0..20 {
            writeln!(writer, "entry {i} with enough bytes to rotate").unwrap();
        }

        // With max_files = 2 only one rotation is retained
        assert!(dir.path().join("api.log.1").exists());
        assert!(!dir.path().join("api.log.2").exists());
    }
}

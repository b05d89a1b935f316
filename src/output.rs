//! Log file output
//!
//! Decoded records go to one file per device, one line per record. The file
//! is only created once the first record arrives, so a session that never
//! downloads leaves nothing behind.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{error, info};

use crate::logs::{LogEvent, LogSink};

/// How log files are named and opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Replaces the timestamped default name
    pub base_name: Option<String>,
    /// Append instead of truncating
    pub append: bool,
    /// Mirror accelerometer lines to stdout
    pub print: bool,
    /// Devices in this run, a device suffix is added when more than one
    pub device_count: usize,
}

/// File name for device `index`
///
/// `Log_%Y-%m-%d-%H-%M-%S.log` unless a base name is given. With several
/// devices `-<index>` goes in front of the extension.
pub fn log_file_name(base: Option<&str>, index: usize, count: usize, now: DateTime<Local>) -> PathBuf {
    let name = match base {
        Some(base) => PathBuf::from(base),
        None => PathBuf::from(format!("Log_{}.log", now.format("%Y-%m-%d-%H-%M-%S"))),
    };
    if count <= 1 {
        return name;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = match name.extension() {
        Some(ext) => format!("{}-{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}-{}", stem, index),
    };
    name.with_file_name(file)
}

/// Writes decoded records to a file
pub struct FileSink {
    path: PathBuf,
    append: bool,
    print: bool,
    writer: Option<BufWriter<File>>,
    /// Set after the first failure so the log is not flooded
    failed: bool,
    lines: u64,
}

impl FileSink {
    pub fn new(path: PathBuf, options: &OutputOptions) -> Self {
        Self {
            path,
            append: options.append,
            print: options.print,
            writer: None,
            failed: false,
            lines: 0,
        }
    }

    /// Sink for device `index`, named from the current local time
    pub fn for_device(index: usize, options: &OutputOptions) -> Self {
        let path = log_file_name(
            options.base_name.as_deref(),
            index,
            options.device_count,
            Local::now(),
        );
        Self::new(path, options)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a file was created
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    fn open(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(self.append)
                .truncate(!self.append)
                .open(&self.path)?;
            info!("Output: logging to {}", self.path.display());
            self.writer = Some(BufWriter::new(file));
        }
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(std::io::ErrorKind::NotFound.into()),
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl LogSink for FileSink {
    fn emit(&mut self, event: &LogEvent<'_>) {
        if self.print && event.is_accel() {
            println!("{}", event);
        }
        if self.failed {
            return;
        }

        let result = self.open().and_then(|writer| writeln!(writer, "{}", event));
        match result {
            Ok(()) => self.lines += 1,
            Err(e) => {
                error!("Output: cannot write {}: {}", self.path.display(), e);
                self.failed = true;
            }
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("Output: flush of {} failed: {}", self.path.display(), e);
        }
    }
}

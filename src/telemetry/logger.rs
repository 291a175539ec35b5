//! # Action Logger
//!
//! Records every emitted action as one JSON line, rotating files by record
//! count and keeping only the newest files.
//!
//! ## Record Format
//!
//! ```text
//! {"timestamp":"2026-10-19T12:00:00.123+00:00","action":"fire","value":{"kind":"digital","value":true}}
//! {"timestamp":"2026-10-19T12:00:00.140+00:00","action":"steering","value":{"kind":"analog","value":-0.42}}
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::controller::action::{ActionSink, ActionValue, PlayerAction};
use crate::error::Result;

const FILE_PREFIX: &str = "actions_";
const FILE_EXTENSION: &str = "jsonl";

/// One logged action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// RFC 3339 wall-clock time of emission.
    pub timestamp: String,
    pub action: PlayerAction,
    pub value: ActionValue,
}

impl ActionRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn now(action: PlayerAction, value: ActionValue) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action,
            value,
        }
    }
}

/// JSONL writer with record-count rotation.
#[derive(Debug)]
pub struct ActionLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    files_opened: u32,
}

impl ActionLogger {
    /// Creates a logger writing into `config.log_dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use touch_controller::config::Config;
    /// use touch_controller::telemetry::ActionLogger;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// let logger = ActionLogger::new(&config.telemetry)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        fs::create_dir_all(&config.log_dir)?;
        info!("Action telemetry enabled, writing to {}", config.log_dir);

        Ok(Self {
            dir: PathBuf::from(&config.log_dir),
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            files_opened: 0,
        })
    }

    /// File currently being written, if any record was logged yet.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Appends one record, rotating first if the current file is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn log(&mut self, record: &ActionRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        self.records_in_file += 1;
        Ok(())
    }

    /// Flushes buffered records to disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        self.files_opened += 1;
        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.files_opened,
            FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened action log {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Deletes the oldest log files beyond `max_files_to_keep`.
    fn prune(&self) -> Result<()> {
        let mut files = log_files(&self.dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            debug!("Removing old action log {}", path.display());
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl ActionSink for ActionLogger {
    fn action(&mut self, action: PlayerAction, value: ActionValue) {
        if let Err(e) = self.log(&ActionRecord::now(action, value)) {
            warn!("Failed to log action {:?}: {}", action, e);
        }
    }
}

impl Drop for ActionLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush action log: {}", e);
        }
    }
}

/// Lists action log files in `dir`.
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.starts_with(FILE_PREFIX) && name.ends_with(&format!(".{}", FILE_EXTENSION))
            });
        if is_log {
            files.push(path);
        }
    }
    Ok(files)
}

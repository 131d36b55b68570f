//! crates/logging-sink/src/file.rs
//! Handler appending records to a file, with optional rotation.

mod rotation;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub use rotation::{DEFAULT_MAX_BACKUP_INDEX, DEFAULT_MAX_FILE_SIZE, RotationPolicy};
use rotation::Rotator;

use crate::error::{SinkError, SinkResult};
use crate::error_manager::ErrorCode;
use crate::formatter::SharedFormatter;
use crate::handler::{Handler, HandlerCore};
use crate::record::Record;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "application.log";

/// Settings for a [`FileHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileConfig {
    /// File to write.
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it.
    pub append: bool,
    /// Rotation rules.
    pub rotation: RotationPolicy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_FILE),
            append: true,
            rotation: RotationPolicy::default(),
        }
    }
}

#[derive(Debug)]
struct FileState {
    file: Option<File>,
    size: u64,
    rotator: Rotator,
}

/// Writes formatted records to a file.
pub struct FileHandler {
    core: HandlerCore,
    path: PathBuf,
    state: Mutex<FileState>,
}

fn open_file(path: &Path, append: bool) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
}

impl FileHandler {
    /// Opens the file, creating parent directories and applying
    /// rotate-on-boot.
    pub fn open(config: FileConfig, formatter: SharedFormatter) -> SinkResult<Self> {
        let FileConfig {
            path,
            append,
            rotation,
        } = config;
        let open_error = |source| SinkError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let rotator = Rotator::new(path.clone(), rotation);
        let occupied = fs::metadata(&path).is_ok_and(|meta| meta.len() > 0);
        let mut append = append;
        if rotator.policy().rotate_on_boot && occupied {
            rotator.rotate_by_size().map_err(|source| SinkError::Rotate {
                path: path.clone(),
                source,
            })?;
            append = false;
        }

        let file = open_file(&path, append).map_err(open_error)?;
        let size = file.metadata().map_or(0, |meta| meta.len());
        Ok(Self {
            core: HandlerCore::new(formatter),
            path: path.clone(),
            state: Mutex::new(FileState {
                file: Some(file),
                size,
                rotator,
            }),
        })
    }

    /// Returns the path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reopen(&self, state: &mut FileState) {
        match open_file(&self.path, false) {
            Ok(file) => {
                state.file = Some(file);
                state.size = 0;
            }
            Err(error) => {
                state.file = None;
                self.core
                    .report("Failed to reopen log file", Some(&error), ErrorCode::Open);
            }
        }
    }
}

impl Handler for FileHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if !self.core.is_loggable(record) {
            return;
        }
        let text = self.core.format(record);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match state.rotator.rotate_by_period(record.timestamp()) {
            Ok(true) => self.reopen(&mut state),
            Ok(false) => {}
            Err(error) => {
                self.core
                    .report("Failed to rotate log file", Some(&error), ErrorCode::Generic);
            }
        }

        let pending = text.len() as u64;
        if state.rotator.exceeds(state.size, pending) {
            state.file = None;
            if let Err(error) = state.rotator.rotate_by_size() {
                self.core
                    .report("Failed to rotate log file", Some(&error), ErrorCode::Generic);
            }
            self.reopen(&mut state);
        }

        let Some(file) = state.file.as_mut() else {
            return;
        };
        match file.write_all(text.as_bytes()) {
            Ok(()) => state.size += pending,
            Err(error) => {
                self.core
                    .report("Failed to write log file", Some(&error), ErrorCode::Write);
            }
        }
    }

    fn flush(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = state.file.as_mut()
            && let Err(error) = file.flush()
        {
            self.core
                .report("Failed to flush log file", Some(&error), ErrorCode::Flush);
        }
    }

    fn close(&self) {
        if !self.core.mark_closed() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = state.file.take()
            && let Err(error) = file.sync_all()
        {
            self.core
                .report("Failed to close log file", Some(&error), ErrorCode::Close);
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

impl fmt::Debug for FileHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandler")
            .field("path", &self.path)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

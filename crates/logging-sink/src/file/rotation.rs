//! crates/logging-sink/src/file/rotation.rs
//! Size- and period-based rotation of a log file.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::formatter::DatePattern;

/// Default size threshold (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of size backups kept.
pub const DEFAULT_MAX_BACKUP_INDEX: u32 = 5;

/// How a log file is rotated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the file would grow beyond this many bytes.
    pub max_file_size: Option<u64>,
    /// Number of numbered backups (`app.log.1` .. `app.log.N`) to keep.
    pub max_backup_index: u32,
    /// Date pattern appended to the file name when the period changes,
    /// e.g. `.yyyy-MM-dd` rotates daily.
    pub file_suffix: Option<String>,
    /// Rotate an existing non-empty file when the handler is opened.
    pub rotate_on_boot: bool,
}

impl RotationPolicy {
    /// A policy that never rotates.
    pub const fn disabled() -> Self {
        Self {
            max_file_size: None,
            max_backup_index: 0,
            file_suffix: None,
            rotate_on_boot: false,
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
            max_backup_index: DEFAULT_MAX_BACKUP_INDEX,
            file_suffix: None,
            rotate_on_boot: true,
        }
    }
}

/// Appends `suffix` to the final component of `path`.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Tracks the rotation state of one file.
#[derive(Debug)]
pub(crate) struct Rotator {
    path: PathBuf,
    policy: RotationPolicy,
    suffix: Option<DatePattern>,
    period: Option<String>,
}

impl Rotator {
    pub(crate) fn new(path: PathBuf, policy: RotationPolicy) -> Self {
        let suffix = policy.file_suffix.as_deref().map(DatePattern::parse);
        let period = suffix.as_ref().map(|suffix| {
            let started = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map_or_else(|_| OffsetDateTime::now_utc(), OffsetDateTime::from);
            suffix.render(started)
        });
        Self {
            path,
            policy,
            suffix,
            period,
        }
    }

    pub(crate) fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    fn backup(&self, index: u32) -> PathBuf {
        with_suffix(&self.path, &format!(".{index}"))
    }

    /// Reports whether writing `pending` more bytes requires a size rotation.
    pub(crate) fn exceeds(&self, current: u64, pending: u64) -> bool {
        self.policy
            .max_file_size
            .is_some_and(|max| current > 0 && current + pending > max)
    }

    /// Shifts numbered backups up by one and moves the live file to `.1`.
    ///
    /// With no backups configured the caller truncates the live file instead.
    pub(crate) fn rotate_by_size(&self) -> io::Result<()> {
        let max = self.policy.max_backup_index;
        if max == 0 || !self.path.exists() {
            return Ok(());
        }
        let oldest = self.backup(max);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..max).rev() {
            let from = self.backup(index);
            if from.exists() {
                fs::rename(&from, self.backup(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup(1))
    }

    /// Moves the live file aside when `now` falls into a new period.
    ///
    /// Returns `true` when a rotation happened.
    pub(crate) fn rotate_by_period(&mut self, now: OffsetDateTime) -> io::Result<bool> {
        let Some(suffix) = &self.suffix else {
            return Ok(false);
        };
        let current = suffix.render(now);
        let Some(previous) = self.period.replace(current.clone()) else {
            return Ok(false);
        };
        if previous == current {
            return Ok(false);
        }
        if fs::metadata(&self.path).is_ok_and(|meta| meta.len() > 0) {
            fs::rename(&self.path, with_suffix(&self.path, &previous))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn size_rotation_shifts_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let rotator = Rotator::new(
            path.clone(),
            RotationPolicy {
                max_file_size: Some(10),
                max_backup_index: 2,
                file_suffix: None,
                rotate_on_boot: false,
            },
        );

        for generation in ["one", "two", "three"] {
            fs::write(&path, generation).unwrap();
            rotator.rotate_by_size().unwrap();
        }

        assert!(!path.exists());
        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "three");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.2")).unwrap(), "two");
        assert!(!dir.path().join("app.log.3").exists());
    }

    #[test]
    fn exceeds_ignores_empty_file() {
        let rotator = Rotator::new(
            PathBuf::from("unused.log"),
            RotationPolicy {
                max_file_size: Some(4),
                ..RotationPolicy::disabled()
            },
        );
        assert!(!rotator.exceeds(0, 100));
        assert!(rotator.exceeds(3, 2));
        assert!(!rotator.exceeds(2, 2));
    }

    #[test]
    fn period_rotation_uses_previous_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut rotator = Rotator::new(
            path.clone(),
            RotationPolicy {
                file_suffix: Some(".yyyy-MM-dd".to_owned()),
                ..RotationPolicy::disabled()
            },
        );
        rotator.period = Some(".2024-01-01".to_owned());
        fs::write(&path, "day one").unwrap();

        assert!(!rotator.rotate_by_period(datetime!(2024-01-01 23:00 UTC)).unwrap());
        assert!(rotator.rotate_by_period(datetime!(2024-01-02 00:01 UTC)).unwrap());

        assert_eq!(
            fs::read_to_string(dir.path().join("app.log.2024-01-01")).unwrap(),
            "day one"
        );
        assert!(!path.exists());
    }
}

//! Series handle file
//!
//! The Selector writes the claimed work-item id (or `-1`) into
//! `<series_id dir>/series_id.txt`; every later stage reads it first.

use crate::error::{PipelineError, PipelineResult};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name inside the `--series_id` directory
pub const HANDLE_FILE_NAME: &str = "series_id.txt";

/// Written value meaning "no eligible work item"
pub const SENTINEL: i64 = -1;

/// Claimed work item, or none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesHandle {
    Sentinel,
    Claimed(i64),
}

impl SeriesHandle {
    pub fn from_raw(value: i64) -> Self {
        if value == SENTINEL {
            SeriesHandle::Sentinel
        } else {
            SeriesHandle::Claimed(value)
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            SeriesHandle::Sentinel => SENTINEL,
            SeriesHandle::Claimed(id) => id,
        }
    }

    /// Work-item id, `None` for the sentinel
    pub fn id(self) -> Option<i64> {
        match self {
            SeriesHandle::Sentinel => None,
            SeriesHandle::Claimed(id) => Some(id),
        }
    }

    pub fn is_sentinel(self) -> bool {
        matches!(self, SeriesHandle::Sentinel)
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(HANDLE_FILE_NAME)
    }

    /// Write the handle, creating the directory when needed
    pub fn write(self, dir: &Path) -> PipelineResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path(dir);
        std::fs::write(&path, format!("{}\n", self.as_raw()))?;
        debug!(path = %path.display(), series_id = self.as_raw(), "Series handle written");
        Ok(())
    }

    pub fn read(dir: &Path) -> PipelineResult<Self> {
        let path = Self::path(dir);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PipelineError::HandleFile(format!("Read {} failed: {}", path.display(), e))
        })?;
        let value = content.trim().parse::<i64>().map_err(|e| {
            PipelineError::HandleFile(format!(
                "{} does not hold an integer ({:?}): {}",
                path.display(),
                content.trim(),
                e
            ))
        })?;
        Ok(Self::from_raw(value))
    }
}

impl fmt::Display for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

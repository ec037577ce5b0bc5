//! Derives work-directory paths shared by the CLI and the server.
//!
//! The work directory holds the trained model and the CSV files written while
//! collecting bars. `collect`, `run`, and `clear` must agree on the layout,
//! so it is computed in one place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// File name prefix of collected data files.
pub const COLLECTED_PREFIX: &str = "collected";

/// File name suffix of collected data files.
pub const COLLECTED_SUFFIX: &str = ".csv";

/// Canonical paths inside the work directory.
#[derive(Debug, Clone)]
pub struct WorkPaths {
    work_dir: PathBuf,
    model_path: PathBuf,
}

impl WorkPaths {
    /// Derives paths for `work_dir`, which must already exist.
    pub fn from_config(work_dir: impl Into<PathBuf>, config: &Config) -> Result<Self, WorkPathsError> {
        let work_dir = work_dir.into();
        if !work_dir.is_dir() {
            return Err(WorkPathsError::NotADirectory { path: work_dir });
        }
        Ok(Self {
            model_path: work_dir.join(&config.model_file),
            work_dir,
        })
    }

    /// The work directory itself.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_path()
    }

    /// Location of the persisted model.
    pub fn model_path(&self) -> &Path {
        self.model_path.as_path()
    }

    /// Path of the collection file for one connection.
    pub fn collection_file(&self, stamp_millis: u128, connection: u64) -> PathBuf {
        self.work_dir.join(format!(
            "{COLLECTED_PREFIX}-{stamp_millis}-{connection}{COLLECTED_SUFFIX}"
        ))
    }

    /// Lists collection files currently present in the work directory.
    pub fn collected_files(&self) -> Result<Vec<PathBuf>, WorkPathsError> {
        let entries = fs::read_dir(&self.work_dir).map_err(|source| WorkPathsError::ReadDir {
            path: self.work_dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WorkPathsError::ReadDir {
                path: self.work_dir.clone(),
                source,
            })?;
            if is_collected_file(&entry.file_name().to_string_lossy()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Deletes every collection file and returns how many were removed.
    pub fn clear_collected(&self) -> Result<usize, WorkPathsError> {
        let files = self.collected_files()?;
        for file in &files {
            fs::remove_file(file).map_err(|source| WorkPathsError::Remove {
                path: file.clone(),
                source,
            })?;
        }
        Ok(files.len())
    }
}

fn is_collected_file(name: &str) -> bool {
    name.starts_with(COLLECTED_PREFIX) && name.ends_with(COLLECTED_SUFFIX)
}

/// Errors raised while working with the work directory.
#[derive(Debug, Error)]
pub enum WorkPathsError {
    /// The configured work path is missing or not a directory.
    #[error("work path '{path}' is not a directory")]
    NotADirectory { path: PathBuf },
    /// Listing the work directory failed.
    #[error("failed to list work directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Removing a collection file failed.
    #[error("failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

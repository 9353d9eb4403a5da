//! Error types for organizing passes and the watch loop.
//!
//! Pass-level errors ([`OrganizeError`]) abort a pass before any file is
//! touched. Per-file errors ([`FileError`]) are isolated to one entry and
//! folded into the pass report. [`WatchError`] covers starting and driving
//! the watch loop.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort an organizing pass.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root directory does not exist.
    #[error("root directory not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// The root exists but is not a directory.
    #[error("root is not a directory: {}", path.display())]
    RootNotDirectory { path: PathBuf },

    /// A category folder could not be created under the root.
    #[error("failed to create folder for category '{category}' at {}: {source}", path.display())]
    CategoryFolderCreateFailed {
        category: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The root directory could not be listed.
    #[error("failed to list {}: {source}", path.display())]
    ListingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors isolated to a single entry during a pass.
#[derive(Debug, Error)]
pub enum FileError {
    /// Moving a classified file to its category folder failed.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A listed entry could not be inspected.
    #[error("failed to inspect {}: {source}", path.display())]
    InspectFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// The source entry this error is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            FileError::FileMoveFailed { from, .. } => from,
            FileError::InspectFailed { path, .. } => path,
        }
    }
}

/// Errors from starting or running the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watched root does not exist or is not a directory.
    #[error("cannot watch {}: not an existing directory", path.display())]
    RootNotFound { path: PathBuf },

    /// Registering for filesystem events failed; the watch did not start.
    #[error("failed to subscribe to events on {}: {source}", path.display())]
    WatchSubscriptionFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The worker thread could not be spawned.
    #[error("failed to spawn watch worker: {0}")]
    WorkerSpawnFailed(#[source] io::Error),

    /// `start` was called on a watcher that is not idle.
    #[error("watcher cannot start from state {0:?}")]
    InvalidState(crate::watcher::WatchState),
}

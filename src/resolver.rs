//! Collision resolution for destination paths.
//!
//! When `target_dir/file_name` is taken, a timestamp suffix is inserted
//! between base name and extension (`<base>_<YYYYMMDDHHMMSS><ext>`) and the
//! check is repeated. The clock is re-read on every retry, so a candidate
//! that collides within the same second is retried until the next second
//! yields a free name.
//!
//! The returned path is free at the moment of the check only. Another process
//! creating the same path before the move is not guarded against.

use crate::category::split_extension;
use chrono::NaiveDateTime;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Suffix format appended to colliding names.
pub const SUFFIX_FORMAT: &str = "%Y%m%d%H%M%S";

/// Pause before re-sampling the clock when a retry repeats the last candidate.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Source of wall-clock time for collision suffixes.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Returns a path under `target_dir` for `file_name` that does not currently exist.
///
/// # Examples
///
/// ```no_run
/// use dirsort::resolver::resolve;
/// use std::path::Path;
///
/// let dest = resolve(Path::new("/downloads/文档"), "notes.txt");
/// println!("moving to {}", dest.display());
/// ```
pub fn resolve(target_dir: &Path, file_name: impl AsRef<OsStr>) -> PathBuf {
    resolve_with(target_dir, file_name, &SystemClock)
}

/// Like [`resolve`], reading time from `clock`.
pub fn resolve_with<C: Clock + ?Sized>(
    target_dir: &Path,
    file_name: impl AsRef<OsStr>,
    clock: &C,
) -> PathBuf {
    let file_name = file_name.as_ref();
    let mut candidate = target_dir.join(file_name);
    if !exists(&candidate) {
        return candidate;
    }

    let (base, ext) = split_extension(file_name);
    loop {
        warn!(
            "Name collision: {} already exists in {}",
            candidate
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default(),
            target_dir.display()
        );

        candidate = loop {
            let next = target_dir.join(stamped_name(base, ext, clock.now()));
            if next != candidate {
                break next;
            }
            thread::sleep(RETRY_BACKOFF);
        };

        if !exists(&candidate) {
            info!("Resolved collision with new name: {}", candidate.display());
            return candidate;
        }
    }
}

/// Builds `<base>_<YYYYMMDDHHMMSS>[.<ext>]`.
fn stamped_name(base: &OsStr, ext: Option<&OsStr>, now: NaiveDateTime) -> OsString {
    let mut name = base.to_os_string();
    name.push(format!("_{}", now.format(SUFFIX_FORMAT)));
    if let Some(ext) = ext {
        name.push(".");
        name.push(ext);
    }
    name
}

/// True if anything (file, directory, or dangling link) occupies `path`.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

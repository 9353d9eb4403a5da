/// One-pass directory organization.
///
/// A pass checks the root, makes sure every category folder exists, then
/// classifies each top-level regular file and moves it into its category
/// folder. Subdirectories, category folders included, are never entered, so
/// re-running a pass over an organized root moves nothing.
///
/// Setup failures abort the pass before any file is touched. A failure on one
/// file is recorded in the [`PassReport`] and the pass carries on.
use crate::category::CategoryMap;
use crate::error::{FileError, OrganizeError};
use crate::resolver::{self, Clock, SystemClock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::{debug, info, warn};

/// An entry found at the top level of the root during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    /// The entry's file name, which need not be valid UTF-8.
    pub name: OsString,
    /// The full path of the entry.
    pub path: PathBuf,
    /// True for directories, including symlinks to directories.
    pub is_dir: bool,
    /// True for regular files, including symlinks to regular files.
    pub is_file: bool,
}

/// What a pass decided to do with one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveDecision {
    /// No category matched; the entry stays where it is.
    Unclassified,
    /// The entry goes to `destination` inside the `category` folder.
    Classified {
        category: String,
        destination: PathBuf,
    },
}

/// Options for a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Plan moves without creating folders or moving files.
    pub dry_run: bool,
}

/// A file moved (or, in a dry run, planned to be moved) during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub category: String,
}

/// A per-file failure recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// The entry the failure is attributed to.
    pub path: PathBuf,
    /// Where the entry was being moved, if a move was attempted.
    pub destination: Option<PathBuf>,
    /// Human-readable cause.
    pub cause: String,
}

impl From<&FileError> for FileFailure {
    fn from(error: &FileError) -> Self {
        let (destination, source) = match error {
            FileError::FileMoveFailed { to, source, .. } => (Some(to.clone()), source),
            FileError::InspectFailed { source, .. } => (None, source),
        };
        Self {
            path: error.path().to_path_buf(),
            destination,
            cause: source.to_string(),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// The root the pass ran over.
    pub root: PathBuf,
    /// True if nothing was changed on disk.
    pub dry_run: bool,
    /// RFC 3339 timestamp of when the pass started.
    pub timestamp: String,
    /// Category folders created by this pass.
    pub created_folders: Vec<PathBuf>,
    /// Files moved into category folders.
    pub moved: Vec<MovedFile>,
    /// Regular files with no matching category, left in place.
    pub skipped: Vec<PathBuf>,
    /// Per-file failures; the pass continued past each of them.
    pub failures: Vec<FileFailure>,
}

impl PassReport {
    fn new(root: PathBuf, dry_run: bool) -> Self {
        Self {
            root,
            dry_run,
            timestamp: chrono::Utc::now().to_rfc3339(),
            created_folders: Vec::new(),
            moved: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if no file failed during the pass.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of moved files per category, sorted by category name.
    pub fn counts_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for moved in &self.moved {
            *counts.entry(moved.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn record_failure(&mut self, error: FileError) {
        warn!("{}", error);
        self.failures.push(FileFailure::from(&error));
    }
}

/// Runs organizing passes over one root directory.
///
/// # Examples
///
/// ```no_run
/// use dirsort::category::CategoryMap;
/// use dirsort::organizer::Organizer;
///
/// let report = Organizer::new("/home/me/Downloads")
///     .dry_run(true)
///     .run(&CategoryMap::default())
///     .expect("pass failed");
/// for moved in &report.moved {
///     println!("{} -> {}", moved.from.display(), moved.to.display());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Organizer<C = SystemClock> {
    root: PathBuf,
    options: PassOptions,
    clock: C,
}

impl Organizer {
    /// Creates an organizer for `root` using the system clock.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: PassOptions::default(),
            clock: SystemClock,
        }
    }
}

impl<C: Clock> Organizer<C> {
    /// Replaces the clock used for collision suffixes.
    pub fn with_clock<D: Clock>(self, clock: D) -> Organizer<D> {
        Organizer {
            root: self.root,
            options: self.options,
            clock,
        }
    }

    pub fn with_options(mut self, options: PassOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs one pass over the root with `categories`.
    ///
    /// The pass holds the root's pass lock for its whole duration, so it never
    /// overlaps another pass on the same directory in this process.
    ///
    /// # Errors
    ///
    /// Returns an [`OrganizeError`] if the root is missing, cannot be listed,
    /// or a category folder cannot be created. Nothing is moved in those cases.
    pub fn run(&self, categories: &CategoryMap) -> Result<PassReport, OrganizeError> {
        self.check_root()?;

        let lock = pass_lock(&self.root);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // The root may have vanished while waiting for the lock.
        self.check_root()?;

        let mut report = PassReport::new(self.root.clone(), self.options.dry_run);
        report.created_folders = self.ensure_category_folders(categories)?;

        let (entries, inspect_failures) = self.list_entries()?;
        for failure in inspect_failures {
            report.record_failure(failure);
        }

        for entry in entries {
            if entry.is_dir {
                debug!("Leaving directory in place: {}", entry.path.display());
                continue;
            }
            if !entry.is_file {
                debug!("Not a regular file: {}", entry.path.display());
                continue;
            }

            match self.decide(&entry, categories) {
                MoveDecision::Unclassified => {
                    debug!("Unclassified file: {}", entry.path.display());
                    report.skipped.push(entry.path);
                }
                MoveDecision::Classified {
                    category,
                    destination,
                } => {
                    if !self.options.dry_run {
                        if let Err(source) = move_file(&entry.path, &destination) {
                            report.record_failure(FileError::FileMoveFailed {
                                from: entry.path,
                                to: destination,
                                source,
                            });
                            continue;
                        }
                        info!(
                            "Moved file: {} -> {}",
                            entry.path.display(),
                            destination.display()
                        );
                    }
                    report.moved.push(MovedFile {
                        from: entry.path,
                        to: destination,
                        category,
                    });
                }
            }
        }

        info!(
            "Pass over {} complete: {} moved, {} unclassified, {} failed",
            self.root.display(),
            report.moved_count(),
            report.skipped_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Classifies `entry` and, if it has a category, picks a free destination.
    ///
    /// Directories and other non-regular entries are always `Unclassified`.
    pub fn decide(&self, entry: &CandidateEntry, categories: &CategoryMap) -> MoveDecision {
        if entry.is_dir || !entry.is_file {
            return MoveDecision::Unclassified;
        }

        match categories.classify(&entry.name) {
            Some(category) => {
                let target_dir = self.root.join(category.name());
                MoveDecision::Classified {
                    category: category.name().to_string(),
                    destination: resolver::resolve_with(&target_dir, &entry.name, &self.clock),
                }
            }
            None => MoveDecision::Unclassified,
        }
    }

    fn check_root(&self) -> Result<(), OrganizeError> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(OrganizeError::RootNotDirectory {
                path: self.root.clone(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(OrganizeError::RootNotFound {
                path: self.root.clone(),
            }),
            Err(source) => Err(OrganizeError::ListingFailed {
                path: self.root.clone(),
                source,
            }),
        }
    }

    /// Creates missing category folders. In a dry run nothing is created, but
    /// a folder path taken by a non-directory still fails the pass.
    ///
    /// On failure, folders created earlier in the same call are removed again.
    fn ensure_category_folders(
        &self,
        categories: &CategoryMap,
    ) -> Result<Vec<PathBuf>, OrganizeError> {
        let mut created = Vec::new();

        for category in categories.iter() {
            let path = self.root.join(category.name());
            if path.is_dir() {
                continue;
            }
            if self.options.dry_run {
                if path.symlink_metadata().is_ok() {
                    return Err(OrganizeError::CategoryFolderCreateFailed {
                        category: category.name().to_string(),
                        path,
                        source: io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            "path exists and is not a directory",
                        ),
                    });
                }
                continue;
            }

            match fs::create_dir(&path) {
                Ok(()) => {
                    info!("Created category folder: {}", path.display());
                    created.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
                Err(source) => {
                    for folder in created.iter().rev() {
                        let _ = fs::remove_dir(folder);
                    }
                    return Err(OrganizeError::CategoryFolderCreateFailed {
                        category: category.name().to_string(),
                        path,
                        source,
                    });
                }
            }
        }

        Ok(created)
    }

    /// Lists the top-level entries of the root, sorted by name.
    fn list_entries(&self) -> Result<(Vec<CandidateEntry>, Vec<FileError>), OrganizeError> {
        let read_dir = fs::read_dir(&self.root).map_err(|source| OrganizeError::ListingFailed {
            path: self.root.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        let mut failures = Vec::new();

        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    failures.push(FileError::InspectFailed {
                        path: self.root.clone(),
                        source,
                    });
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name();

            match fs::metadata(&path) {
                Ok(meta) => entries.push(CandidateEntry {
                    name,
                    path,
                    is_dir: meta.is_dir(),
                    is_file: meta.is_file(),
                }),
                // Vanished since listing, or a dangling symlink.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Skipping unreachable entry: {}", path.display());
                }
                Err(source) => failures.push(FileError::InspectFailed { path, source }),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok((entries, failures))
    }
}

/// Runs one pass over `root` with the system clock and default options.
///
/// # Examples
///
/// ```no_run
/// use dirsort::category::CategoryMap;
/// use dirsort::organizer::organize_pass;
///
/// match organize_pass("/home/me/Downloads".as_ref(), &CategoryMap::default()) {
///     Ok(report) => println!("moved {} files", report.moved_count()),
///     Err(e) => eprintln!("pass failed: {}", e),
/// }
/// ```
pub fn organize_pass(root: &Path, categories: &CategoryMap) -> Result<PassReport, OrganizeError> {
    Organizer::new(root).run(categories)
}

/// Returns the lock serializing passes over `root`.
///
/// Locks are keyed by canonical path so different spellings of one directory
/// share a lock. Entries are dropped once no pass holds them.
pub(crate) fn pass_lock(root: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> = OnceLock::new();

    let key = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
        return lock;
    }

    locks.retain(|_, lock| lock.strong_count() > 0);
    let lock = Arc::new(Mutex::new(()));
    locks.insert(key, Arc::downgrade(&lock));
    lock
}

/// Moves `from` to `to`, copying across filesystems when a rename cannot.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "Rename across devices, copying {} to {}",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to, |path| fs::remove_file(path))
        }
        Err(e) => Err(e),
    }
}

/// Copies `from` to `to` and removes `from` with `remove_source`.
///
/// On any failure the copy is removed again, so the file is left only at `from`.
fn copy_then_remove<F>(from: &Path, to: &Path, remove_source: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if let Err(copy_err) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(copy_err);
    }
    if let Err(remove_err) = remove_source(from) {
        let _ = fs::remove_file(to);
        return Err(remove_err);
    }
    Ok(())
}

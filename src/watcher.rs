//! Change-driven reorganization of a watched directory.
//!
//! A [`WatchHandle`] subscribes to non-recursive filesystem events on one root
//! and hands them to a single worker thread. Every event that reports a new
//! regular file in the root triggers a full organizing pass; passes run one at
//! a time, in event order.

use crate::category::CategoryMap;
use crate::error::{OrganizeError, WatchError};
use crate::organizer::{PassReport, organize_pass};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Result of one watch-triggered pass.
pub type PassOutcome = Result<PassReport, OrganizeError>;

/// Callback invoked on the worker thread after every pass.
pub type PassObserver = Box<dyn FnMut(&PassOutcome) + Send + 'static>;

/// Lifecycle of a watch handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Created, not yet subscribed.
    Idle,
    /// Subscribed; events trigger passes.
    Watching,
    /// Unsubscribed; the worker has exited.
    Stopped,
}

enum Message {
    Fs(notify::Result<Event>),
    Stop,
}

/// Handle to the watch loop on one root directory.
///
/// Dropping the handle stops the loop.
pub struct WatchHandle {
    root: PathBuf,
    categories: Arc<RwLock<CategoryMap>>,
    state: WatchState,
    stopping: Arc<AtomicBool>,
    passes: Arc<AtomicUsize>,
    watched_path: Option<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    tx: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Creates an idle handle for `root`.
    pub fn new(root: impl Into<PathBuf>, categories: CategoryMap) -> Self {
        Self {
            root: root.into(),
            categories: Arc::new(RwLock::new(categories)),
            state: WatchState::Idle,
            stopping: Arc::new(AtomicBool::new(false)),
            passes: Arc::new(AtomicUsize::new(0)),
            watched_path: None,
            watcher: None,
            tx: None,
            worker: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Number of passes the worker has completed.
    pub fn passes_run(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Swaps the category table used by subsequent passes.
    ///
    /// A pass already running finishes with the table it started with.
    pub fn replace_categories(&self, categories: CategoryMap) {
        *self
            .categories
            .write()
            .unwrap_or_else(PoisonError::into_inner) = categories;
        info!("Category table reloaded for {}", self.root.display());
    }

    /// Subscribes to events on the root and starts the worker.
    ///
    /// `observer` is called on the worker thread with the outcome of every pass.
    ///
    /// # Errors
    ///
    /// Fails if the handle is not idle, the root is not an existing directory,
    /// or the event subscription cannot be registered. On error nothing is left
    /// registered and the handle stays idle.
    pub fn start<F>(&mut self, observer: F) -> Result<(), WatchError>
    where
        F: FnMut(&PassOutcome) + Send + 'static,
    {
        if self.state != WatchState::Idle {
            return Err(WatchError::InvalidState(self.state));
        }
        if !self.root.is_dir() {
            return Err(WatchError::RootNotFound {
                path: self.root.clone(),
            });
        }

        let canonical_root = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let (tx, rx) = mpsc::channel();

        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(Message::Fs(res));
        })
        .map_err(|source| WatchError::WatchSubscriptionFailed {
            path: self.root.clone(),
            source,
        })?;

        watcher
            .watch(&canonical_root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::WatchSubscriptionFailed {
                path: self.root.clone(),
                source,
            })?;

        let worker = Worker {
            root: self.root.clone(),
            canonical_root: canonical_root.clone(),
            categories: Arc::clone(&self.categories),
            stopping: Arc::clone(&self.stopping),
            passes: Arc::clone(&self.passes),
            observer: Box::new(observer),
        };

        let handle = thread::Builder::new()
            .name("dirsort-watch".to_string())
            .spawn(move || worker.run(rx))
            .map_err(WatchError::WorkerSpawnFailed)?;

        self.watched_path = Some(canonical_root);
        self.watcher = Some(watcher);
        self.tx = Some(tx);
        self.worker = Some(handle);
        self.state = WatchState::Watching;
        info!("Watching {}", self.root.display());
        Ok(())
    }

    /// Stops the watch loop.
    ///
    /// Events not yet picked up by the worker are discarded. A pass already
    /// running is allowed to finish; this call returns after it has. Calling
    /// `stop` more than once is harmless.
    pub fn stop(&mut self) {
        match self.state {
            WatchState::Stopped => return,
            WatchState::Idle => {
                self.state = WatchState::Stopped;
                return;
            }
            WatchState::Watching => {}
        }

        self.stopping.store(true, Ordering::SeqCst);

        if let Some(mut watcher) = self.watcher.take()
            && let Some(path) = self.watched_path.take()
            && let Err(e) = watcher.unwatch(&path)
        {
            debug!("Unwatch of {} failed: {}", self.root.display(), e);
        }

        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Message::Stop);
        }

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                warn!("stop() called from the watch worker; not waiting for it");
            } else if worker.join().is_err() {
                error!("Watch worker for {} panicked", self.root.display());
            }
        }

        self.state = WatchState::Stopped;
        info!("Stopped watching {}", self.root.display());
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("root", &self.root)
            .field("state", &self.state)
            .field("passes", &self.passes_run())
            .finish()
    }
}

/// Starts watching `root`, logging each pass outcome.
///
/// # Examples
///
/// ```no_run
/// use dirsort::category::CategoryMap;
/// use dirsort::watcher::start_watch;
///
/// let mut handle = start_watch("/home/me/Downloads", CategoryMap::default())?;
/// // ... later
/// handle.stop();
/// # Ok::<(), dirsort::error::WatchError>(())
/// ```
pub fn start_watch(
    root: impl Into<PathBuf>,
    categories: CategoryMap,
) -> Result<WatchHandle, WatchError> {
    start_watch_with(root, categories, log_outcome)
}

/// Starts watching `root`, calling `observer` after every pass.
pub fn start_watch_with<F>(
    root: impl Into<PathBuf>,
    categories: CategoryMap,
    observer: F,
) -> Result<WatchHandle, WatchError>
where
    F: FnMut(&PassOutcome) + Send + 'static,
{
    let mut handle = WatchHandle::new(root, categories);
    handle.start(observer)?;
    Ok(handle)
}

fn log_outcome(outcome: &PassOutcome) {
    if let Ok(report) = outcome
        && !report.is_clean()
    {
        warn!(
            "{} file(s) in {} could not be organized",
            report.failed_count(),
            report.root.display()
        );
    }
}

struct Worker {
    root: PathBuf,
    canonical_root: PathBuf,
    categories: Arc<RwLock<CategoryMap>>,
    stopping: Arc<AtomicBool>,
    passes: Arc<AtomicUsize>,
    observer: PassObserver,
}

impl Worker {
    fn run(mut self, rx: Receiver<Message>) {
        for message in rx {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            match message {
                Message::Stop => break,
                Message::Fs(Ok(event)) => self.handle_event(&event),
                Message::Fs(Err(e)) => warn!("Watch error: {}", e),
            }
        }
        debug!("Watch worker for {} exiting", self.root.display());
    }

    fn handle_event(&mut self, event: &Event) {
        let qualifying = created_paths(event)
            .iter()
            .filter(|path| self.is_in_root(path))
            .any(|path| is_regular_file(path));
        if !qualifying {
            return;
        }

        let categories = self
            .categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let outcome = organize_pass(&self.root, &categories);
        if let Err(e) = &outcome {
            error!("Organize pass failed: {}", e);
        }
        self.passes.fetch_add(1, Ordering::SeqCst);
        (self.observer)(&outcome);
    }

    fn is_in_root(&self, path: &Path) -> bool {
        path.parent()
            .is_some_and(|parent| parent == self.root || parent == self.canonical_root)
    }
}

/// Paths an event reports as newly present.
fn created_paths(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            &event.paths
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            &event.paths[event.paths.len().saturating_sub(1)..]
        }
        _ => &[],
    }
}

fn is_regular_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => true,
        Ok(_) => {
            info!("Ignoring non-file creation: {}", path.display());
            false
        }
        Err(_) => {
            info!("Ignoring entry gone before inspection: {}", path.display());
            false
        }
    }
}

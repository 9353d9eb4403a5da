//! dirsort - keep a directory sorted into category folders
//!
//! This library classifies files by extension, moves them into per-category
//! subfolders with collision-safe names, and can watch a directory so that
//! new arrivals are sorted as they appear.

pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod organizer;
pub mod output;
pub mod resolver;
pub mod watcher;

pub use category::{Category, CategoryMap};
pub use config::{ConfigError, OrganizerConfig};
pub use error::{FileError, OrganizeError, WatchError};
pub use organizer::{Organizer, PassOptions, PassReport, organize_pass};
pub use watcher::{WatchHandle, WatchState, start_watch, start_watch_with};

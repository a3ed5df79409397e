//! Watch mode with live reload for marquee sites.
//!
//! Re-runs the matching build task when a source file changes, and tells
//! connected browsers to reload when the output changes.

pub mod livereload;
pub mod server;
pub mod watcher;

pub use livereload::{LiveReloadHub, LiveReloadMessage};
pub use server::{ServerError, WatchServer, WatchServerConfig};
pub use watcher::{task_for_change, FileWatcher, WatchEvent};

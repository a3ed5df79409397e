//! File watching for rebuilds and live reload.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use marquee_static::Task;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// File was created
    Created(PathBuf),

    /// File was modified
    Modified(PathBuf),

    /// File was deleted
    Deleted(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Deleted(p) => p,
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive events. Repeated events
    /// for the same path within 100ms are collapsed.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let debounce = Duration::from_millis(100);
            let mut last_seen: HashMap<PathBuf, Instant> = HashMap::new();

            while let Ok(event) = sync_rx.recv() {
                let now = Instant::now();
                for path in event.paths {
                    if let Some(previous) = last_seen.get(&path) {
                        if now.duration_since(*previous) < debounce {
                            continue;
                        }
                    }
                    last_seen.insert(path.clone(), now);

                    if let Some(e) = classify_event(path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: PathBuf, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path)),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path)),
        EventKind::Modify(_) => Some(WatchEvent::Modified(path)),
        _ => None,
    }
}

/// The task to re-run when `path`, inside `source_dir`, changes.
pub fn task_for_change(source_dir: &Path, path: &Path) -> Option<Task> {
    let relative = path.strip_prefix(source_dir).ok()?;
    let top: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .take(2)
        .collect();
    let ext = relative.extension().and_then(|e| e.to_str()).unwrap_or("");

    match top.as_slice() {
        ["css", ..] => Some(Task::CompileStyles),
        ["js", "lib", ..] | ["images", ..] | ["enhanced-views", ..] => Some(Task::CopyAssets),
        ["js", ..] if ext == "js" => Some(Task::BundleScripts),
        ["content", ..] if ext == "json" => Some(Task::GeneratePages),
        _ if ext == "jinja" => Some(Task::GeneratePages),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("index.jinja");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "{{ title }}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert!(event.path().ends_with("index.jinja"));
    }

    #[test]
    fn maps_changes_to_tasks() {
        let src = Path::new("/site/src");
        let task = |p: &str| task_for_change(src, &src.join(p));

        assert_eq!(task("css/main.css"), Some(Task::CompileStyles));
        assert_eq!(task("css/partials/nav.css"), Some(Task::CompileStyles));
        assert_eq!(task("js/app.js"), Some(Task::BundleScripts));
        assert_eq!(task("js/lib/curl.js"), Some(Task::CopyAssets));
        assert_eq!(task("images/logo.png"), Some(Task::CopyAssets));
        assert_eq!(task("enhanced-views/job.jinja"), Some(Task::CopyAssets));
        assert_eq!(task("content/authors.json"), Some(Task::GeneratePages));
        assert_eq!(task("index.jinja"), Some(Task::GeneratePages));
        assert_eq!(task("partials/nav.jinja"), Some(Task::GeneratePages));
        assert_eq!(task("notes.txt"), None);
        assert_eq!(task_for_change(src, Path::new("/elsewhere/index.jinja")), None);
    }
}

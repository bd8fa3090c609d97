//! Sketch file watching
//!
//! Editors often save by writing a temporary file and renaming it over the
//! original, which drops a watch placed on the file itself. The watch goes
//! on the sketch's directory instead and events are narrowed back down to
//! the sketch files.

use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Forwards filesystem events that touch a watched sketch file.
///
/// notify runs its own background thread; dropping this stops it.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    sketches: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileWatcher {
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let sketches: Arc<Mutex<HashSet<PathBuf>>> = Arc::default();
        let filter = Arc::clone(&sketches);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let forward = match res {
                Ok(mut event) => {
                    let Ok(sketches) = filter.lock() else {
                        return;
                    };
                    event.paths.retain(|p| sketches.contains(p));
                    if event.paths.is_empty() {
                        return;
                    }
                    Ok(event)
                }
                Err(e) => Err(e),
            };
            // Receiver gone means the REPL is exiting
            let _ = tx.send(forward);
        })?;

        Ok(Self { watcher, sketches })
    }

    /// Start forwarding events for the sketch at `path`, which must exist
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        let (sketch, dir) = locate(path.as_ref())?;
        if !self.shares_dir(&dir) {
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        }
        self.with_sketches(|s| {
            s.insert(sketch);
        });
        Ok(())
    }

    pub fn unwatch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        let (sketch, dir) = locate(path.as_ref())?;
        self.with_sketches(|s| {
            s.remove(&sketch);
        });
        if !self.shares_dir(&dir) {
            self.watcher.unwatch(&dir)?;
        }
        Ok(())
    }

    /// Sketch files currently watched, as canonical paths
    pub fn sketches(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        self.with_sketches(|s| paths.extend(s.iter().cloned()));
        paths
    }

    fn shares_dir(&self, dir: &Path) -> bool {
        let mut shared = false;
        self.with_sketches(|s| shared = s.iter().any(|p| p.parent() == Some(dir)));
        shared
    }

    fn with_sketches(&self, f: impl FnOnce(&mut HashSet<PathBuf>)) {
        if let Ok(mut sketches) = self.sketches.lock() {
            f(&mut sketches);
        }
    }
}

/// Canonical sketch path and the directory holding it
fn locate(path: &Path) -> notify::Result<(PathBuf, PathBuf)> {
    let sketch = fs::canonicalize(path).map_err(notify::Error::io)?;
    let dir = sketch
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| notify::Error::generic("sketch path has no parent directory"))?;
    Ok((sketch, dir))
}

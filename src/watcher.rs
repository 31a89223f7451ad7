//! Source directory watcher.
//!
//! Watches the user's live-coding directory and, on every change, reads
//! the whole directory back into a single snapshot text sent over a
//! channel. Consumers (the language front-end) turn the text into an
//! engine snapshot and ingest it.

use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read every regular file of `dir` in name order and concatenate their
/// contents. This is the full-snapshot model: the engine always sees
/// the complete buffer, never a diff.
pub fn read_snapshot(dir: &Path) -> io::Result<String> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(fs::read_to_string(&path)?);
    }
    Ok(parts.join("\n"))
}

/// Watches a directory and emits snapshot texts on change.
pub struct SourceWatcher {
    watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch `dir`, sending a fresh snapshot for every filesystem event.
    pub fn new(dir: impl AsRef<Path>, tx: Sender<String>) -> notify::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let watched = dir.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Send errors mean the receiver was dropped; read errors can
            // happen mid-save and the next event will catch up.
            if res.is_ok() {
                if let Ok(text) = read_snapshot(&watched) {
                    let _ = tx.send(text);
                }
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(Self { watcher })
    }

    /// Stop watching a path.
    pub fn unwatch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        self.watcher.unwatch(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;

    #[test]
    fn test_read_snapshot_concatenates_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write!(File::create(dir.path().join("b.soir")).unwrap(), "second").unwrap();
        write!(File::create(dir.path().join("a.soir")).unwrap(), "first").unwrap();

        let text = read_snapshot(dir.path()).unwrap();
        assert_eq!(text, "first\nsecond");
    }

    #[test]
    fn test_read_snapshot_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_snapshot(dir.path()).unwrap(), "");
    }
}

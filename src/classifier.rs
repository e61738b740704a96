//! Change classification: raw watcher notifications to per-file events
//!
//! A raw event may name a directory; classification expands it into one
//! event per concrete file. Creation expands over files currently on disk,
//! removal over files the engine previously tracked beneath the path.
//! Files without a recognized stylesheet extension are dropped, and the
//! survivors are tagged partial or non-partial by the basename rule.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::entries::walk_stylesheets;
use crate::paths;

/// Kind of a raw or semantic filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Created,
    Modified,
    Removed,
}

/// A notification as delivered by the watcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A semantic per-file event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
    /// Basename begins with `_`
    pub partial: bool,
}

/// Expand one raw event into semantic file events
///
/// `known_files` is the set of files the engine currently tracks (entry
/// sources and every file holding a dependency record); it drives the
/// expansion of removals, which can no longer consult the filesystem.
pub fn classify(event: RawEvent, known_files: &BTreeSet<PathBuf>) -> Vec<FileEvent> {
    let path = paths::canonical(&event.path);
    match event.kind {
        RawEventKind::Created => {
            if path.is_dir() {
                walk_stylesheets(&path)
                    .into_iter()
                    .map(|file| file_event(file, RawEventKind::Created))
                    .collect()
            } else {
                single(path, RawEventKind::Created)
            }
        }
        RawEventKind::Modified => {
            // Directory metadata changes carry no per-file information.
            if path.is_dir() {
                Vec::new()
            } else {
                single(path, RawEventKind::Modified)
            }
        }
        RawEventKind::Removed => {
            if known_files.contains(&path) || paths::has_stylesheet_extension(&path) {
                single(path, RawEventKind::Removed)
            } else {
                // Treat the path as a removed directory prefix.
                known_files
                    .iter()
                    .filter(|file| file.starts_with(&path))
                    .cloned()
                    .map(|file| file_event(file, RawEventKind::Removed))
                    .collect()
            }
        }
    }
}

fn single(path: PathBuf, kind: RawEventKind) -> Vec<FileEvent> {
    if paths::has_stylesheet_extension(&path) {
        vec![file_event(path, kind)]
    } else {
        Vec::new()
    }
}

fn file_event(path: PathBuf, kind: RawEventKind) -> FileEvent {
    let partial = paths::is_partial(&path);
    FileEvent {
        path,
        kind,
        partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn unrecognized_extensions_are_dropped() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        write(&txt, "");

        let events = classify(
            RawEvent::new(txt, RawEventKind::Modified),
            &BTreeSet::new(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn partial_tagging_follows_basename() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("_lib.scss");
        write(&partial, "");

        let events = classify(
            RawEvent::new(partial, RawEventKind::Modified),
            &BTreeSet::new(),
        );
        assert_eq!(events.len(), 1);
        assert!(events[0].partial);
    }

    #[test]
    fn created_directory_expands_over_existing_files() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        write(&sub.join("a.scss"), "");
        write(&sub.join("_b.scss"), "");
        write(&sub.join("ignore.txt"), "");

        let events = classify(RawEvent::new(sub, RawEventKind::Created), &BTreeSet::new());
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == RawEventKind::Created));
    }

    #[test]
    fn modified_directory_is_dropped() {
        let dir = tempdir().unwrap();
        let events = classify(
            RawEvent::new(dir.path().to_path_buf(), RawEventKind::Modified),
            &BTreeSet::new(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn removed_directory_expands_over_known_files() {
        let dir = tempdir().unwrap();
        let sub = paths::canonical(&dir.path().join("sub"));
        let known = BTreeSet::from([
            sub.join("a.scss"),
            sub.join("nested/_b.scss"),
            paths::canonical(&dir.path().join("other.scss")),
        ]);

        let events = classify(RawEvent::new(sub.clone(), RawEventKind::Removed), &known);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == RawEventKind::Removed));
        assert!(events.iter().all(|e| e.path.starts_with(&sub)));
    }

    #[test]
    fn removed_known_file_stays_single() {
        let dir = tempdir().unwrap();
        let file = paths::canonical(&dir.path().join("a.scss"));
        let known = BTreeSet::from([file.clone()]);

        let events = classify(RawEvent::new(file.clone(), RawEventKind::Removed), &known);
        assert_eq!(events, vec![FileEvent {
            path: file,
            kind: RawEventKind::Removed,
            partial: false,
        }]);
    }
}

//! Filesystem watch loop
//!
//! Wraps the `notify` recommended watcher: raw notifications funnel into an
//! mpsc channel, collect in a debounce window, and flush to the engine as
//! one batch. Modified events whose content hash is unchanged are dropped
//! to filter editor auto-save noise.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::classifier::{RawEvent, RawEventKind};
use crate::compiler::Compiler;
use crate::engine::Engine;
use crate::error::{SasswatchError, SasswatchResult};
use crate::event::WatchEvent;

/// Debounce duration in milliseconds
pub const DEBOUNCE_MS: u64 = 100;

/// Pending raw events inside the debounce window
#[derive(Debug, Default)]
struct DebounceState {
    pending: Vec<RawEvent>,
    last_change: Option<Instant>,
}

impl DebounceState {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, event: RawEvent) {
        if !self.pending.contains(&event) {
            self.pending.push(event);
        }
        self.last_change = Some(Instant::now());
    }

    fn should_flush(&self) -> bool {
        match self.last_change {
            Some(last) => {
                !self.pending.is_empty() && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
            }
            None => false,
        }
    }

    fn take(&mut self) -> Vec<RawEvent> {
        self.last_change = None;
        std::mem::take(&mut self.pending)
    }
}

/// Map one notify event onto raw engine events
fn raw_events(event: Event) -> Vec<RawEvent> {
    let kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => Some(RawEventKind::Created),
        EventKind::Remove(_) => Some(RawEventKind::Removed),
        // Renames and everything else get classified by what's on disk now.
        EventKind::Modify(ModifyKind::Name(_)) => None,
        _ => Some(RawEventKind::Modified),
    };
    event
        .paths
        .into_iter()
        .map(|path| {
            let kind = kind.unwrap_or_else(|| {
                if path.exists() {
                    RawEventKind::Created
                } else {
                    RawEventKind::Removed
                }
            });
            RawEvent { path, kind }
        })
        .collect()
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Drop Modified events whose file content did not actually change
fn filter_noise(event: RawEvent, hashes: &mut HashMap<PathBuf, u64>) -> Option<RawEvent> {
    match event.kind {
        RawEventKind::Removed => {
            hashes.remove(&event.path);
            Some(event)
        }
        RawEventKind::Created | RawEventKind::Modified => {
            if !event.path.is_file() {
                return Some(event);
            }
            let Ok(content) = std::fs::read_to_string(&event.path) else {
                return Some(event);
            };
            let hash = content_hash(&content);
            let unchanged = event.kind == RawEventKind::Modified
                && hashes.get(&event.path) == Some(&hash);
            hashes.insert(event.path.clone(), hash);
            if unchanged {
                None
            } else {
                Some(event)
            }
        }
    }
}

/// Run the watch loop until the running flag drops (blocking)
///
/// Watcher setup failure is fatal; everything after the loop starts is
/// per-entry recoverable and never exits the loop.
pub fn watch<C: Compiler>(
    engine: &mut Engine<C>,
    running: Arc<AtomicBool>,
    on_event: &dyn Fn(WatchEvent),
) -> SasswatchResult<()> {
    let (tx, rx) = channel::<RawEvent>();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                for raw in raw_events(event) {
                    let _ = tx.send(raw);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| SasswatchError::Watch(e.to_string()))?;

    for root in engine.watch_roots() {
        if root.exists() {
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| SasswatchError::Watch(e.to_string()))?;
        }
    }

    // Seed content hashes so pre-existing files don't trigger a spurious
    // round when the watcher first registers.
    let mut hashes: HashMap<PathBuf, u64> = HashMap::new();
    for path in engine.tracked_files() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            hashes.insert(path, content_hash(&content));
        }
    }

    let mut state = DebounceState::new();
    while running.load(Ordering::SeqCst) {
        if let Ok(raw) = rx.recv_timeout(Duration::from_millis(50)) {
            if let Some(raw) = filter_noise(raw, &mut hashes) {
                state.add(raw);
            }
        }
        if state.should_flush() {
            engine.process(state.take(), on_event);
        }
    }

    on_event(WatchEvent::Shutdown);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn debounce_waits_for_quiet_interval() {
        let mut state = DebounceState::new();
        assert!(!state.should_flush());

        state.add(RawEvent::new("test.scss", RawEventKind::Modified));
        assert!(!state.should_flush());

        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
        assert!(state.should_flush());

        let batch = state.take();
        assert_eq!(batch.len(), 1);
        assert!(!state.should_flush());
    }

    #[test]
    fn debounce_coalesces_identical_events() {
        let mut state = DebounceState::new();
        state.add(RawEvent::new("test.scss", RawEventKind::Modified));
        state.add(RawEvent::new("test.scss", RawEventKind::Modified));
        state.add(RawEvent::new("test.scss", RawEventKind::Removed));

        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
        assert_eq!(state.take().len(), 2);
    }

    #[test]
    fn unchanged_modify_is_filtered() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.scss");
        fs::write(&file, "a {b: c}").unwrap();

        let mut hashes = HashMap::new();
        let first = filter_noise(
            RawEvent::new(file.clone(), RawEventKind::Modified),
            &mut hashes,
        );
        assert!(first.is_some());

        // Same content again: dropped.
        let second = filter_noise(
            RawEvent::new(file.clone(), RawEventKind::Modified),
            &mut hashes,
        );
        assert!(second.is_none());

        fs::write(&file, "x {y: z}").unwrap();
        let third = filter_noise(RawEvent::new(file, RawEventKind::Modified), &mut hashes);
        assert!(third.is_some());
    }

    #[test]
    fn removal_clears_hash_state() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.scss");
        fs::write(&file, "a {b: c}").unwrap();

        let mut hashes = HashMap::new();
        filter_noise(
            RawEvent::new(file.clone(), RawEventKind::Modified),
            &mut hashes,
        );
        fs::remove_file(&file).unwrap();
        filter_noise(
            RawEvent::new(file.clone(), RawEventKind::Removed),
            &mut hashes,
        );
        assert!(hashes.is_empty());
    }
}

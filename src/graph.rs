//! Per-file dependency records and the derived import graph
//!
//! Every tracked file (entry or partial) owns one [`FileRecord`], replaced
//! wholesale after each compile attempt for that file. The reverse index
//! from a file to the entries depending on it is derived state: it is
//! recomputed from the flat record map after each settled compile instead
//! of being mutated incrementally, so delete/recreate cycles can never
//! leave dangling edges.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::resolver::ProbeSlot;

/// Dependency record for one tracked file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    /// Files actually imported by the last compile attempt touching this file
    pub resolved: BTreeSet<PathBuf>,
    /// Probed-but-unmatched (or matched) import slots from that attempt
    pub potential: BTreeSet<ProbeSlot>,
}

/// Reverse import index derived from the per-file records
#[derive(Debug, Default)]
pub struct ImportGraph {
    records: HashMap<PathBuf, FileRecord>,
    /// file -> entries whose transitive resolved closure contains it
    dependents: HashMap<PathBuf, BTreeSet<PathBuf>>,
    /// probe slot -> entries whose closure probed it
    slot_watchers: HashMap<ProbeSlot, BTreeSet<PathBuf>>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records of every file visited by a compile attempt
    pub fn replace_records(&mut self, records: HashMap<PathBuf, FileRecord>) {
        for (path, record) in records {
            self.records.insert(path, record);
        }
    }

    /// Drop all state for a removed file
    pub fn drop_file(&mut self, path: &Path) {
        self.records.remove(path);
    }

    /// Entries whose resolved closure contains `path`
    pub fn dependents_of(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.dependents.get(path).cloned().unwrap_or_default()
    }

    /// Entries holding a probe slot that a file appearing at `path` satisfies
    pub fn slot_watchers_of(&self, path: &Path) -> BTreeSet<PathBuf> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return BTreeSet::new();
        };
        let slot = (parent.to_path_buf(), name.to_string_lossy().into_owned());
        self.slot_watchers.get(&slot).cloned().unwrap_or_default()
    }

    /// Every file currently holding a record
    pub fn tracked_files(&self) -> BTreeSet<PathBuf> {
        self.records.keys().cloned().collect()
    }

    /// Recompute the reverse index from the live entry set
    ///
    /// Walks each entry's resolved closure, unioning dependents and probe
    /// slots along the way, and prunes records no longer reachable from any
    /// entry.
    pub fn rebuild<'a>(&mut self, entries: impl IntoIterator<Item = &'a PathBuf>) {
        self.dependents.clear();
        self.slot_watchers.clear();

        let mut reachable: BTreeSet<PathBuf> = BTreeSet::new();
        for entry in entries {
            let mut queue: Vec<PathBuf> = vec![entry.clone()];
            let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
            while let Some(file) = queue.pop() {
                if !seen.insert(file.clone()) {
                    continue;
                }
                reachable.insert(file.clone());
                self.dependents
                    .entry(file.clone())
                    .or_default()
                    .insert(entry.clone());
                if let Some(record) = self.records.get(&file) {
                    for slot in &record.potential {
                        self.slot_watchers
                            .entry(slot.clone())
                            .or_default()
                            .insert(entry.clone());
                    }
                    queue.extend(record.resolved.iter().cloned());
                }
            }
        }

        self.records.retain(|path, _| reachable.contains(path));
    }
}

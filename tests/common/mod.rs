//! Shared helpers for engine integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use sasswatch::{Engine, EntryMapping, EntryTable, SassCompiler, WatchEvent};

/// Write a file, creating parent directories
pub fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Build an engine over explicit `input:output` pairs
pub fn engine_for(pairs: &[(PathBuf, PathBuf)], load_paths: Vec<PathBuf>) -> Engine<SassCompiler> {
    let mappings = pairs
        .iter()
        .map(|(input, output)| EntryMapping::new(input.clone(), output.clone()).unwrap())
        .collect();
    Engine::new(EntryTable::new(mappings), load_paths, SassCompiler::new())
}

/// Captures engine events for assertions
#[derive(Default)]
pub struct Recorder {
    events: RefCell<Vec<WatchEvent>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: WatchEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<WatchEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// Inputs of `Compiled` events recorded so far (drains)
    pub fn compiled_inputs(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .filter_map(|event| match event {
                WatchEvent::Compiled { input, .. } => Some(input),
                _ => None,
            })
            .collect()
    }
}

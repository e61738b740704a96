//! Recompilation scheduler
//!
//! Consumes debounced batches of raw filesystem events, decides which
//! entries are affected, and drives the compiler. Distinct entries compile
//! concurrently within one scheduling round; rounds are sequential, so a
//! single entry's compiles are strictly serialized and any events arriving
//! while a round runs coalesce into at most one follow-up compile per
//! entry in the next round.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::thread;

use crate::classifier::{classify, FileEvent, RawEvent, RawEventKind};
use crate::compiler::{CompileOutcome, Compiler};
use crate::entries::{Entry, EntryTable};
use crate::event::WatchEvent;
use crate::graph::ImportGraph;
use crate::paths;
use crate::writer;

/// Whether an entry's output file currently reflects a successful compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputState {
    Current,
    Absent,
}

#[derive(Debug)]
struct EntryState {
    output: PathBuf,
    display_input: String,
    display_output: String,
    output_state: OutputState,
}

/// The watch-mode compilation engine
pub struct Engine<C: Compiler> {
    table: EntryTable,
    load_paths: Vec<PathBuf>,
    compiler: C,
    graph: ImportGraph,
    entries: BTreeMap<PathBuf, EntryState>,
}

impl<C: Compiler> Engine<C> {
    pub fn new(table: EntryTable, load_paths: Vec<PathBuf>, compiler: C) -> Self {
        let load_paths = load_paths.iter().map(|p| paths::canonical(p)).collect();
        Self {
            table,
            load_paths,
            compiler,
            graph: ImportGraph::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Compile every entry known at startup
    pub fn compile_all(&mut self, on_event: &dyn Fn(WatchEvent)) {
        let mut targets = BTreeSet::new();
        for entry in self.table.scan() {
            targets.insert(entry.input.clone());
            self.ensure_entry(entry);
        }
        self.run_round(targets, on_event);
    }

    /// True when any entry's last compile failed
    pub fn has_failures(&self) -> bool {
        self.entries
            .values()
            .any(|state| state.output_state == OutputState::Absent)
    }

    /// Directories the watcher must observe
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.table.roots();
        for load_path in &self.load_paths {
            if !roots.contains(load_path) {
                roots.push(load_path.clone());
            }
        }
        roots
    }

    /// Files currently tracked: entry sources plus record holders
    pub fn tracked_files(&self) -> BTreeSet<PathBuf> {
        let mut files = self.graph.tracked_files();
        files.extend(self.entries.keys().cloned());
        files
    }

    /// Process one debounced batch: classify, schedule, compile, settle
    pub fn process(&mut self, batch: Vec<RawEvent>, on_event: &dyn Fn(WatchEvent)) {
        let mut targets: BTreeSet<PathBuf> = BTreeSet::new();
        for raw in batch {
            let known = self.tracked_files();
            for event in classify(raw, &known) {
                self.dispatch(event, &mut targets, on_event);
            }
        }
        // A removal earlier in the batch may have dropped a scheduled entry.
        targets.retain(|input| self.entries.contains_key(input));
        self.run_round(targets, on_event);
    }

    fn dispatch(
        &mut self,
        event: FileEvent,
        targets: &mut BTreeSet<PathBuf>,
        on_event: &dyn Fn(WatchEvent),
    ) {
        let path = &event.path;
        match self.table.entry_for(path) {
            Some(entry) => match event.kind {
                RawEventKind::Created | RawEventKind::Modified => {
                    // The entry may itself be imported by other entries.
                    targets.extend(self.graph.dependents_of(path));
                    if event.kind == RawEventKind::Created {
                        targets.extend(self.graph.slot_watchers_of(path));
                    }
                    self.ensure_entry(entry);
                    targets.insert(path.clone());
                }
                RawEventKind::Removed => {
                    targets.extend(self.graph.dependents_of(path));
                    // An entry can sit in another file's ambiguous pair.
                    targets.extend(self.graph.slot_watchers_of(path));
                    self.remove_entry(path, on_event);
                }
            },
            None => match event.kind {
                RawEventKind::Removed => {
                    targets.extend(self.graph.dependents_of(path));
                    // Removing one of an ambiguous candidate pair frees the
                    // import; every entry that probed the slot re-resolves.
                    targets.extend(self.graph.slot_watchers_of(path));
                    self.graph.drop_file(path);
                }
                RawEventKind::Created | RawEventKind::Modified => {
                    targets.extend(self.graph.dependents_of(path));
                    targets.extend(self.graph.slot_watchers_of(path));
                }
            },
        }
    }

    fn ensure_entry(&mut self, entry: Entry) {
        let Entry {
            input,
            output,
            display_input,
            display_output,
        } = entry;
        self.entries.entry(input).or_insert_with(|| EntryState {
            output,
            display_input,
            display_output,
            output_state: OutputState::Absent,
        });
    }

    fn remove_entry(&mut self, path: &Path, on_event: &dyn Fn(WatchEvent)) {
        let Some(state) = self.entries.remove(path) else {
            return;
        };
        self.graph.drop_file(path);
        if state.output_state == OutputState::Current {
            let _ = writer::remove_output(&state.output);
            on_event(WatchEvent::Deleted {
                output: state.display_output,
            });
        }
    }

    /// Compile `targets` concurrently, then settle each in order
    fn run_round(&mut self, targets: BTreeSet<PathBuf>, on_event: &dyn Fn(WatchEvent)) {
        if !targets.is_empty() {
            let compiler = &self.compiler;
            let load_paths = &self.load_paths;
            let inputs: Vec<PathBuf> = targets.into_iter().collect();
            let outcomes: Vec<CompileOutcome> = thread::scope(|scope| {
                let handles: Vec<_> = inputs
                    .iter()
                    .map(|input| scope.spawn(move || compiler.compile(input, load_paths)))
                    .collect();
                handles
                    .into_iter()
                    .zip(&inputs)
                    .map(|(handle, input)| {
                        handle.join().unwrap_or_else(|_| {
                            CompileOutcome::failure(input, "internal error: compiler panicked")
                        })
                    })
                    .collect()
            });
            for (input, outcome) in inputs.iter().zip(outcomes) {
                self.settle(input, outcome, on_event);
            }
        }
        self.graph.rebuild(self.entries.keys());
    }

    fn settle(&mut self, input: &Path, outcome: CompileOutcome, on_event: &dyn Fn(WatchEvent)) {
        self.graph.replace_records(outcome.records);
        let Some(state) = self.entries.get_mut(input) else {
            return;
        };
        match outcome.result {
            Ok(css) => match writer::write_atomic(&state.output, &css) {
                Ok(()) => {
                    state.output_state = OutputState::Current;
                    on_event(WatchEvent::Compiled {
                        input: state.display_input.clone(),
                        output: state.display_output.clone(),
                    });
                }
                // Output I/O failures get the compile-failure treatment.
                Err(err) => fail(state, &err.to_string(), String::new(), on_event),
            },
            Err(err) => {
                let context = err.render_context();
                fail(state, &err.message, context, on_event);
            }
        }
    }
}

fn fail(state: &mut EntryState, message: &str, context: String, on_event: &dyn Fn(WatchEvent)) {
    if state.output_state == OutputState::Current {
        let _ = writer::remove_output(&state.output);
        on_event(WatchEvent::Deleted {
            output: state.display_output.clone(),
        });
    }
    state.output_state = OutputState::Absent;
    on_event(WatchEvent::CompileFailed {
        input: state.display_input.clone(),
        message: message.to_string(),
        context,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SassCompiler;
    use crate::entries::EntryMapping;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    fn engine_for(
        pairs: &[(PathBuf, PathBuf)],
        load_paths: Vec<PathBuf>,
    ) -> Engine<SassCompiler> {
        let mappings = pairs
            .iter()
            .map(|(i, o)| EntryMapping::new(i.clone(), o.clone()).unwrap())
            .collect();
        Engine::new(EntryTable::new(mappings), load_paths, SassCompiler::new())
    }

    #[test]
    fn startup_compile_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("test.scss");
        let output = dir.path().join("out.css");
        fs::write(&input, "a {b: c}").unwrap();

        let mut engine = engine_for(&[(input, output.clone())], vec![]);
        let events = RefCell::new(Vec::new());
        let on_event = |e: WatchEvent| events.borrow_mut().push(e);
        engine.compile_all(&on_event);

        assert_eq!(fs::read_to_string(&output).unwrap(), "a {\n  b: c;\n}\n");
        assert_eq!(events.borrow().len(), 1);
        assert!(!engine.has_failures());
    }

    #[test]
    fn failed_compile_deletes_stale_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("test.scss");
        let output = dir.path().join("out.css");
        fs::write(&input, "a {b: c}").unwrap();

        let mut engine = engine_for(&[(input.clone(), output.clone())], vec![]);
        let events = RefCell::new(Vec::new());
        let on_event = |e: WatchEvent| events.borrow_mut().push(e);
        engine.compile_all(&on_event);
        assert!(output.exists());

        fs::write(&input, "a {b c}").unwrap();
        engine.process(
            vec![RawEvent::new(input, RawEventKind::Modified)],
            &on_event,
        );

        assert!(!output.exists());
        assert!(engine.has_failures());
        let events = events.borrow();
        assert!(matches!(events[1], WatchEvent::Deleted { .. }));
        assert!(matches!(events[2], WatchEvent::CompileFailed { .. }));
    }

    #[test]
    fn removed_entry_emits_single_deletion() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("test.scss");
        let output = dir.path().join("out.css");
        fs::write(&input, "a {b: c}").unwrap();

        let mut engine = engine_for(&[(input.clone(), output.clone())], vec![]);
        let events = RefCell::new(Vec::new());
        let on_event = |e: WatchEvent| events.borrow_mut().push(e);
        engine.compile_all(&on_event);

        fs::remove_file(&input).unwrap();
        engine.process(vec![RawEvent::new(input, RawEventKind::Removed)], &on_event);

        assert!(!output.exists());
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], WatchEvent::Deleted { .. }));
    }

    #[test]
    fn watch_roots_include_load_paths() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        let input = dir.path().join("test.scss");
        fs::write(&input, "").unwrap();

        let engine = engine_for(
            &[(input, dir.path().join("out.css"))],
            vec![lib.clone()],
        );
        let roots = engine.watch_roots();
        assert!(roots.contains(&paths::canonical(&lib)));
    }
}

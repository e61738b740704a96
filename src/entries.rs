//! Entry table: the static mapping from watched inputs to outputs
//!
//! Built once at startup from the CLI `INPUT:OUTPUT` arguments. File
//! mappings are used as-is; directory mappings expand recursively, with
//! every recognized non-partial stylesheet under the input directory
//! mapping 1:1 by relative path to a `.css` file under the output
//! directory. Partials never receive a mapping of their own.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{SasswatchError, SasswatchResult};
use crate::paths;

/// One watched file-to-file or directory-to-directory pair
#[derive(Debug, Clone)]
pub struct EntryMapping {
    /// Canonical input path
    input: PathBuf,
    /// Canonical output path
    output: PathBuf,
    /// Input as given on the command line, for status lines
    raw_input: PathBuf,
    /// Output as given on the command line
    raw_output: PathBuf,
    is_directory: bool,
}

/// A concrete entry point: one stylesheet mapped to one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Paths rendered the way the user wrote them
    pub display_input: String,
    pub display_output: String,
}

impl EntryMapping {
    /// Build a mapping from a raw `INPUT:OUTPUT` pair
    ///
    /// Whether this is a directory mapping is decided by what the input
    /// path names on disk right now. A partial on the input side of a file
    /// mapping is rejected: partials never map to an output of their own.
    pub fn new(raw_input: PathBuf, raw_output: PathBuf) -> SasswatchResult<Self> {
        let input = paths::canonical(&raw_input);
        let is_directory = input.is_dir();
        if !is_directory && paths::is_partial(&input) {
            return Err(SasswatchError::usage(
                "Partial files can't be compiled to CSS.",
            ));
        }
        Ok(Self {
            input,
            output: paths::canonical(&raw_output),
            raw_input,
            raw_output,
            is_directory,
        })
    }

    fn entry_for(&self, path: &Path) -> Option<Entry> {
        if self.is_directory {
            let rel = path.strip_prefix(&self.input).ok()?;
            if !paths::has_stylesheet_extension(rel) || paths::is_partial(rel) {
                return None;
            }
            let out_rel = rel.with_extension("css");
            Some(Entry {
                input: path.to_path_buf(),
                output: self.output.join(&out_rel),
                display_input: self.raw_input.join(rel).display().to_string(),
                display_output: self.raw_output.join(&out_rel).display().to_string(),
            })
        } else if path == self.input {
            Some(Entry {
                input: self.input.clone(),
                output: self.output.clone(),
                display_input: self.raw_input.display().to_string(),
                display_output: self.raw_output.display().to_string(),
            })
        } else {
            None
        }
    }
}

/// The full set of mappings given on the command line
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    mappings: Vec<EntryMapping>,
}

impl EntryTable {
    pub fn new(mappings: Vec<EntryMapping>) -> Self {
        Self { mappings }
    }

    /// All entries that exist right now (startup scan)
    ///
    /// File mappings always yield their entry, present on disk or not; a
    /// missing input surfaces as a compile failure rather than a scan gap.
    pub fn scan(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        for mapping in &self.mappings {
            if mapping.is_directory {
                for file in walk_stylesheets(&mapping.input) {
                    if let Some(entry) = mapping.entry_for(&file) {
                        entries.push(entry);
                    }
                }
            } else if let Some(entry) = mapping.entry_for(&mapping.input) {
                entries.push(entry);
            }
        }
        entries
    }

    /// Map a source path to its entry, if it is (or would be) one
    ///
    /// First mapping wins, matching command-line order.
    pub fn entry_for(&self, path: &Path) -> Option<Entry> {
        self.mappings.iter().find_map(|m| m.entry_for(path))
    }

    /// Directories the watcher must observe for entry-file events
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for mapping in &self.mappings {
            let root = if mapping.is_directory {
                mapping.input.clone()
            } else {
                match mapping.input.parent() {
                    Some(parent) => parent.to_path_buf(),
                    None => continue,
                }
            };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }
}

/// Recursively list recognized stylesheet files under a directory
///
/// Unreadable subtrees are skipped; the walk is sorted for deterministic
/// compile order.
pub fn walk_stylesheets(dir: &Path) -> Vec<PathBuf> {
    let mut walker = WalkBuilder::new(dir);
    walker
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_path(|a, b| a.cmp(b));
    walker
        .build()
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| paths::canonical(entry.path()))
        .filter(|path| paths::has_stylesheet_extension(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn file_mapping_yields_single_entry() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("test.scss");
        write(&input, "a {b: c}");

        let mapping = EntryMapping::new(input.clone(), dir.path().join("out.css")).unwrap();
        let table = EntryTable::new(vec![mapping]);

        let entries = table.scan();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].input, paths::canonical(&input));
    }

    #[test]
    fn partial_file_mapping_is_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("_partial.scss");
        write(&input, "");

        let err = EntryMapping::new(input, dir.path().join("out.css")).unwrap_err();
        assert_eq!(err.to_string(), "Partial files can't be compiled to CSS.");
    }

    #[test]
    fn directory_mapping_expands_recursively() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.scss"), "");
        write(&src.join("sub/b.sass"), "");
        write(&src.join("_lib.scss"), "");
        write(&src.join("notes.txt"), "");

        let mapping = EntryMapping::new(src.clone(), dir.path().join("out")).unwrap();
        let table = EntryTable::new(vec![mapping]);

        let entries = table.scan();
        let names: Vec<_> = entries
            .iter()
            .map(|e| e.input.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.scss", "b.sass"]);
    }

    #[test]
    fn directory_entry_output_mirrors_relative_path() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("sub/b.scss"), "");

        let mapping = EntryMapping::new(src.clone(), dir.path().join("out")).unwrap();
        let table = EntryTable::new(vec![mapping]);

        let entries = table.scan();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].output,
            paths::canonical(&dir.path().join("out")).join("sub/b.css")
        );
    }

    #[test]
    fn partials_never_qualify_under_directory_mapping() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("_test.scss"), "");

        let mapping = EntryMapping::new(src.clone(), dir.path().join("out")).unwrap();
        let table = EntryTable::new(vec![mapping]);

        assert!(table.scan().is_empty());
        let partial = paths::canonical(&src.join("_test.scss"));
        assert!(table.entry_for(&partial).is_none());
    }

    #[test]
    fn entry_for_matches_files_created_later() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let mapping = EntryMapping::new(src.clone(), dir.path().join("out")).unwrap();
        let table = EntryTable::new(vec![mapping]);

        // Not on disk yet; still qualifies by path shape.
        let future = paths::canonical(&src).join("late.scss");
        let entry = table.entry_for(&future).unwrap();
        assert_eq!(
            entry.output,
            paths::canonical(&dir.path().join("out")).join("late.css")
        );
    }

    #[test]
    fn roots_deduplicate() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.scss");
        let b = dir.path().join("b.scss");
        write(&a, "");
        write(&b, "");

        let table = EntryTable::new(vec![
            EntryMapping::new(a, dir.path().join("a.css")).unwrap(),
            EntryMapping::new(b, dir.path().join("b.css")).unwrap(),
        ]);
        assert_eq!(table.roots().len(), 1);
    }
}

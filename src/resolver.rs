//! Import resolution with precedence, ambiguity, and probe recording
//!
//! A specifier is searched first in the importing file's own directory,
//! then in each load path in command-line order. Within one directory the
//! probe kinds are ordered: exact partial, exact non-partial, index file of
//! a same-named subdirectory. A kind that matches both a `.scss` and a
//! `.sass` candidate is ambiguous and fails the whole resolution on the
//! spot; lower-precedence directories are not consulted even if one of them
//! would match uniquely.
//!
//! Every `(directory, filename)` slot that gets probed is recorded into the
//! caller's probe log, hit or miss. The engine keeps those slots as
//! potential dependencies so a file appearing at any probed location later
//! triggers recompilation, even when the import originally failed or
//! resolved elsewhere.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::paths;

/// Extensions the resolver probes, in candidate order
const RESOLVE_EXTENSIONS: [&str; 2] = ["scss", "sass"];

/// A probed `(directory, filename)` location
pub type ProbeSlot = (PathBuf, String);

/// Outcome of resolving one import specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one candidate matched
    File(PathBuf),
    /// Two same-kind candidates matched; resolution fails immediately
    Ambiguous(Vec<PathBuf>),
    /// No candidate matched in any directory
    NotFound,
}

/// Resolve `specifier` imported from `from_file` against `load_paths`
///
/// `probes` receives every slot that was checked, whether or not it hit.
pub fn resolve(
    specifier: &str,
    from_file: &Path,
    load_paths: &[PathBuf],
    probes: &mut BTreeSet<ProbeSlot>,
) -> Resolution {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(parent) = from_file.parent() {
        dirs.push(parent.to_path_buf());
    }
    dirs.extend(load_paths.iter().cloned());

    let spec = Path::new(specifier);
    let base = match spec.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => return Resolution::NotFound,
    };
    let sub = spec
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);

    // A specifier that already names a recognized extension probes only the
    // exact and partial variant with that extension.
    let explicit = spec
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| RESOLVE_EXTENSIONS.contains(e))
        .map(str::to_string);

    for dir in dirs {
        let dir = match &sub {
            Some(sub) => paths::normalize(&dir.join(sub)),
            None => dir,
        };

        let kinds: Vec<Vec<String>> = match &explicit {
            Some(ext) => {
                let stem = base
                    .strip_suffix(&format!(".{ext}"))
                    .unwrap_or(&base)
                    .to_string();
                vec![
                    vec![format!("_{stem}.{ext}")],
                    vec![format!("{stem}.{ext}")],
                ]
            }
            None => vec![
                RESOLVE_EXTENSIONS
                    .iter()
                    .map(|e| format!("_{base}.{e}"))
                    .collect(),
                RESOLVE_EXTENSIONS
                    .iter()
                    .map(|e| format!("{base}.{e}"))
                    .collect(),
            ],
        };

        for kind in &kinds {
            if let Some(resolution) = probe_kind(&dir, kind, probes) {
                return resolution;
            }
        }

        if explicit.is_none() {
            let index_dir = dir.join(&base);
            let kind: Vec<String> = RESOLVE_EXTENSIONS
                .iter()
                .map(|e| format!("_index.{e}"))
                .collect();
            if let Some(resolution) = probe_kind(&index_dir, &kind, probes) {
                return resolution;
            }
        }
    }

    Resolution::NotFound
}

/// Probe one kind's candidates in one directory
///
/// Returns `None` when nothing matched (search continues), a resolution
/// otherwise. Ambiguity within a kind ends the search.
fn probe_kind(
    dir: &Path,
    names: &[String],
    probes: &mut BTreeSet<ProbeSlot>,
) -> Option<Resolution> {
    let mut hits: Vec<PathBuf> = Vec::new();
    for name in names {
        probes.insert((dir.to_path_buf(), name.clone()));
        let candidate = dir.join(name);
        if candidate.is_file() {
            hits.push(paths::canonical(&candidate));
        }
    }
    match hits.len() {
        0 => None,
        1 => Some(Resolution::File(hits.remove(0))),
        _ => Some(Resolution::Ambiguous(hits)),
    }
}

//! Output writer: materializes compiled CSS, removes stale outputs
//!
//! Writes go through a tempfile in the target directory followed by a
//! rename, so an interrupted process never leaves a half-written CSS file.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::SasswatchResult;

/// Write `content` to `path` atomically, creating parent directories
pub fn write_atomic(path: &Path, content: &str) -> SasswatchResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove an output file if it exists; absent-to-absent is a no-op
pub fn remove_output(path: &Path) -> SasswatchResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("out.css");

        write_atomic(&out, "a {\n  b: c;\n}\n").unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "a {\n  b: c;\n}\n");
    }

    #[test]
    fn write_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.css");
        fs::write(&out, "old").unwrap();

        write_atomic(&out, "new").unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "new");
    }

    #[test]
    fn remove_deletes_existing_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.css");
        fs::write(&out, "x").unwrap();

        remove_output(&out).unwrap();

        assert!(!out.exists());
    }

    #[test]
    fn remove_missing_output_is_a_noop() {
        let dir = tempdir().unwrap();
        assert!(remove_output(&dir.path().join("never.css")).is_ok());
    }
}

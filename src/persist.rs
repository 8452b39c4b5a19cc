use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::PersistError;

/// Atomically replace `path` with `content`.
///
/// The data goes to a temp file in the same directory, is synced, and then
/// renamed over the target, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_atomic(&path, b"old contents that are longer").unwrap();
        write_atomic(&path, b"new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn write_atomic_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_atomic(&path, b"data").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_atomic_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("doc.json");

        let result = write_atomic(&path, b"data");
        assert!(matches!(result, Err(PersistError::Io { .. })));
    }
}

use std::path::{Path, PathBuf};

use crate::episode::is_partial_file;
use crate::error::StateError;

/// A subscription directory that is ready to receive downloads
#[derive(Debug, Clone)]
pub struct Destination {
    pub dir: PathBuf,
    /// Number of partial files that were cleaned up
    pub partial_files_cleaned: usize,
}

/// Make sure `dir` exists and holds no leftovers from interrupted downloads.
///
/// A `.partial` file never has a marker, so removing it loses nothing; the
/// item it belonged to is downloaded again.
pub fn prepare_destination(dir: &Path) -> Result<Destination, StateError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| StateError::CreateDirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        return Ok(Destination {
            dir: dir.to_path_buf(),
            partial_files_cleaned: 0,
        });
    }

    let read_err = |e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut partial_files_cleaned = 0;
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_partial_file);

        if is_partial && std::fs::remove_file(&path).is_ok() {
            partial_files_cleaned += 1;
        }
    }

    Ok(Destination {
        dir: dir.to_path_buf(),
        partial_files_cleaned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_nonexistent_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Show");

        let dest = prepare_destination(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(dest.dir, target);
        assert_eq!(dest.partial_files_cleaned, 0);
    }

    #[test]
    fn existing_dir_is_left_intact() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ep.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("ep.json"), b"{}").unwrap();

        let dest = prepare_destination(dir.path()).unwrap();

        assert_eq!(dest.partial_files_cleaned, 0);
        assert!(dir.path().join("ep.mp3").exists());
        assert!(dir.path().join("ep.json").exists());
    }

    #[test]
    fn cleans_up_partial_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("episode1.mp3.partial"), b"partial data 1").unwrap();
        std::fs::write(dir.path().join("episode2.mp3.partial"), b"partial data 2").unwrap();
        std::fs::write(dir.path().join("episode3.mp3"), b"complete audio").unwrap();

        let dest = prepare_destination(dir.path()).unwrap();

        assert_eq!(dest.partial_files_cleaned, 2);
        assert!(!dir.path().join("episode1.mp3.partial").exists());
        assert!(!dir.path().join("episode2.mp3.partial").exists());
        assert!(dir.path().join("episode3.mp3").exists());
    }

    #[test]
    fn file_in_the_way_is_an_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Show");
        std::fs::write(&target, b"not a directory").unwrap();

        assert!(matches!(
            prepare_destination(&target),
            Err(StateError::ReadDirectoryFailed { .. })
        ));
    }
}

//! Download directory: artifact name resolution and bulk cleanup.
//!
//! Jobs only ever store a bare file name; every path handed out is that name
//! joined onto the download directory.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Name to record for a finished fetch (final path component).
    pub fn artifact_name(output_path: &Path) -> Option<String> {
        output_path
            .file_name()
            .and_then(OsStr::to_str)
            .map(str::to_string)
    }

    /// Path of a recorded artifact. None unless `file_name` is a single
    /// normal path component.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.dir.join(name)),
            _ => None,
        }
    }

    /// Delete every regular file directly inside the download directory.
    /// Files that cannot be removed are logged and skipped.
    pub fn remove_all_files(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "deleted file");
                    removed += 1;
                }
                Err(e) => tracing::warn!(path = %path.display(), "could not delete file: {}", e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_is_last_component() {
        assert_eq!(
            ArtifactStore::artifact_name(Path::new("/srv/dl/My clip.mp4")).as_deref(),
            Some("My clip.mp4")
        );
        assert!(ArtifactStore::artifact_name(Path::new("/")).is_none());
    }

    #[test]
    fn resolve_accepts_bare_names_only() {
        let store = ArtifactStore::new("/srv/dl");
        assert_eq!(
            store.resolve("clip.mp4"),
            Some(PathBuf::from("/srv/dl/clip.mp4"))
        );
        assert!(store.resolve("../etc/passwd").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("sub/clip.mp4").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve("").is_none());
    }

    #[test]
    fn remove_all_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();

        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.remove_all_files().unwrap(), 2);
        assert!(dir.path().join("keep").is_dir());
        assert_eq!(store.remove_all_files().unwrap(), 0);
    }

    #[test]
    fn remove_all_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("missing"));
        assert_eq!(store.remove_all_files().unwrap(), 0);
    }
}

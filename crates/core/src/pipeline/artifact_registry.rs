use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Owns every intermediate file a job produces.
///
/// All artifacts live under a private work directory. Registered paths are
/// removed individually on cleanup, then the work directory itself. Removal
/// is best-effort: failures are logged and never stop the remaining
/// deletions. Dropping the registry cleans up too, so every exit path of a
/// job is covered.
pub struct ArtifactRegistry {
    work_dir: Option<TempDir>,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl ArtifactRegistry {
    pub fn new() -> io::Result<Self> {
        let work_dir = tempfile::Builder::new().prefix("chunkscribe-").tempdir()?;
        log::debug!("Created work directory {}", work_dir.path().display());
        Ok(Self {
            work_dir: Some(work_dir),
            files: Vec::new(),
            dirs: Vec::new(),
        })
    }

    /// Directory new artifacts should be written into. Empty after cleanup.
    pub fn work_dir(&self) -> &Path {
        self.work_dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Creates and registers a subdirectory of the work directory.
    pub fn create_dir(&mut self, name: &str) -> io::Result<PathBuf> {
        let dir = self.work_dir().join(name);
        fs::create_dir_all(&dir)?;
        self.register_dir(dir.clone());
        Ok(dir)
    }

    pub fn register_file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }

    pub fn register_dir(&mut self, path: impl Into<PathBuf>) {
        self.dirs.push(path.into());
    }

    /// Deletes every registered artifact and the work directory. Idempotent.
    pub fn cleanup(&mut self) {
        for file in self.files.drain(..) {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {e}", file.display()),
            }
        }
        for dir in self.dirs.drain(..).rev() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {e}", dir.display()),
            }
        }
        if let Some(work_dir) = self.work_dir.take() {
            let path = work_dir.path().to_path_buf();
            if let Err(e) = work_dir.close() {
                log::warn!("Failed to remove work directory {}: {e}", path.display());
            }
        }
    }
}

impl Drop for ArtifactRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_files_and_work_dir() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let work = registry.work_dir().to_path_buf();
        let file = work.join("a.mp3");
        fs::write(&file, b"x").unwrap();
        registry.register_file(&file);

        registry.cleanup();

        assert!(!file.exists());
        assert!(!work.exists());
    }

    #[test]
    fn test_cleanup_removes_files_outside_work_dir() {
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("converted.mp3");
        fs::write(&file, b"x").unwrap();

        let mut registry = ArtifactRegistry::new().unwrap();
        registry.register_file(&file);
        registry.cleanup();

        assert!(!file.exists());
    }

    #[test]
    fn test_missing_file_does_not_block_others() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let present = registry.work_dir().join("present.mp3");
        fs::write(&present, b"x").unwrap();
        registry.register_file(registry.work_dir().join("never-written.mp3"));
        registry.register_file(&present);

        registry.cleanup();

        assert!(!present.exists());
    }

    #[test]
    fn test_created_dir_is_removed() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let dir = registry.create_dir("segments").unwrap();
        fs::write(dir.join("segment-000.mp3"), b"x").unwrap();

        registry.cleanup();

        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut registry = ArtifactRegistry::new().unwrap();
        registry.cleanup();
        registry.cleanup();
    }

    #[test]
    fn test_drop_cleans_up() {
        let work;
        {
            let registry = ArtifactRegistry::new().unwrap();
            work = registry.work_dir().to_path_buf();
            fs::write(work.join("a.wav"), b"x").unwrap();
        }
        assert!(!work.exists());
    }
}

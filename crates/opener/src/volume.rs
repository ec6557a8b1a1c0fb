//! Filesystem-backed volume set for split archives.

use crate::callback::VolumeSource;
use crate::probe::InStream;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Volumes stored as files in one directory.
///
/// Volume names are file names resolved relative to the directory of the
/// first volume. Names containing path separators are rejected.
#[derive(Debug, Clone)]
pub struct FileVolumeSet {
    dir: PathBuf,
    first: String,
    current: String,
}

impl FileVolumeSet {
    /// Volume set whose first volume is `first_volume`.
    pub fn new(first_volume: &Path) -> io::Result<Self> {
        let first = first_volume
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid volume path: {}", first_volume.display()),
                )
            })?
            .to_string();

        let dir = first_volume
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            dir,
            current: first.clone(),
            first,
        })
    }

    fn path_of(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return None;
        }
        Some(self.dir.join(name))
    }
}

impl VolumeSource for FileVolumeSet {
    fn first_volume_name(&self) -> String {
        self.first.clone()
    }

    fn current_volume_name(&self) -> String {
        self.current.clone()
    }

    fn current_volume_size(&self) -> u64 {
        self.path_of(&self.current)
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn move_to_volume(&mut self, name: &str) -> bool {
        match self.path_of(name) {
            Some(path) if path.is_file() => {
                self.current = name.to_string();
                true
            }
            _ => false,
        }
    }

    fn open_current_volume(&mut self) -> io::Result<Box<dyn InStream>> {
        let path = self.path_of(&self.current).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid volume name")
        })?;
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_volume_navigation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.001"), b"first").unwrap();
        fs::write(dir.path().join("data.002"), b"second!").unwrap();

        let mut volumes = FileVolumeSet::new(&dir.path().join("data.001")).unwrap();
        assert_eq!(volumes.first_volume_name(), "data.001");
        assert_eq!(volumes.current_volume_size(), 5);

        assert!(volumes.move_to_volume("data.002"));
        assert_eq!(volumes.current_volume_name(), "data.002");
        assert_eq!(volumes.current_volume_size(), 7);

        let mut content = String::new();
        volumes
            .open_current_volume()
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second!");
    }

    #[test]
    fn test_missing_or_escaping_volume() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.001"), b"x").unwrap();

        let mut volumes = FileVolumeSet::new(&dir.path().join("data.001")).unwrap();
        assert!(!volumes.move_to_volume("data.002"));
        assert!(!volumes.move_to_volume("../data.001"));
        assert!(!volumes.move_to_volume(".."));
        assert_eq!(volumes.current_volume_name(), "data.001");
    }
}

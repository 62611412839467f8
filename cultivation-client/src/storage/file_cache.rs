use cultivation_game::LocalCache;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "cultivation::cache";

/// Local save cache backed by a single JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, snapshot: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, snapshot)?;
        fs::rename(&temp, &self.path)
    }
}

impl LocalCache for FileCache {
    fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                log::error!(target: LOG_TARGET, "failed to read {}: {err}", self.path.display());
                None
            }
        }
    }

    fn store(&self, snapshot: &str) {
        if let Err(err) = self.write_atomically(snapshot) {
            log::error!(target: LOG_TARGET, "failed to write {}: {err}", self.path.display());
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                log::error!(target: LOG_TARGET, "failed to remove {}: {err}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "cultivation-cache-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let cache = FileCache::new(temp_dir("missing").join("save.json"));
        assert!(cache.load().is_none());
    }

    #[test]
    fn store_creates_parent_dirs_and_round_trips() {
        let dir = temp_dir("store");
        let cache = FileCache::new(dir.join("nested").join("save.json"));
        cache.store(r#"{"lastSaveTime":1}"#);
        assert_eq!(cache.load().as_deref(), Some(r#"{"lastSaveTime":1}"#));
        cache.store(r#"{"lastSaveTime":2}"#);
        assert_eq!(cache.load().as_deref(), Some(r#"{"lastSaveTime":2}"#));
        assert!(!cache.temp_path().exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let cache = FileCache::new(temp_dir("clear").join("save.json"));
        cache.store("{}");
        cache.clear();
        cache.clear();
        assert!(cache.load().is_none());
    }
}

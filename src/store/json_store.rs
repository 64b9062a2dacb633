use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::store::schema::{LibraryData, LongitudinalData, ProfileData, SessionHistoryData};

const PROFILE_FILE: &str = "profile.json";
const LONGITUDINAL_FILE: &str = "longitudinal.json";
const HISTORY_FILE: &str = "session_history.json";
const LIBRARY_FILE: &str = "library.json";

pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snipdrill");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("creating data dir {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Missing, unreadable and corrupt files all come back as defaults so a
    /// damaged store never blocks practice.
    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.file_path(name);
        if !path.exists() {
            return T::default();
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(file = name, %err, "unreadable store file, using defaults");
                return T::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(err) => {
                warn!(file = name, %err, "corrupt store file, using defaults");
                T::default()
            }
        }
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replacing {}", path.display()))?;
        debug!(file = name, bytes = json.len(), "saved");
        Ok(())
    }

    pub fn load_profile(&self) -> ProfileData {
        let data: ProfileData = self.load(PROFILE_FILE);
        if data.needs_reset() {
            warn!(version = data.schema_version, "stale profile schema, starting fresh");
            return ProfileData::default();
        }
        data
    }

    pub fn save_profile(&self, data: &ProfileData) -> Result<()> {
        self.save(PROFILE_FILE, data)
    }

    pub fn load_longitudinal(&self) -> LongitudinalData {
        let mut data: LongitudinalData = self.load(LONGITUDINAL_FILE);
        if data.needs_reset() {
            warn!(version = data.schema_version, "stale longitudinal schema, starting fresh");
            return LongitudinalData::default();
        }
        data.sanitize();
        data
    }

    pub fn save_longitudinal(&self, data: &LongitudinalData) -> Result<()> {
        self.save(LONGITUDINAL_FILE, data)
    }

    pub fn load_history(&self) -> SessionHistoryData {
        let data: SessionHistoryData = self.load(HISTORY_FILE);
        if data.needs_reset() {
            warn!(version = data.schema_version, "stale history schema, starting fresh");
            return SessionHistoryData::default();
        }
        data
    }

    pub fn save_history(&self, data: &SessionHistoryData) -> Result<()> {
        self.save(HISTORY_FILE, data)
    }

    pub fn load_library(&self) -> LibraryData {
        let data: LibraryData = self.load(LIBRARY_FILE);
        if data.needs_reset() {
            warn!(version = data.schema_version, "stale library schema, starting fresh");
            return LibraryData::default();
        }
        data
    }

    pub fn save_library(&self, data: &LibraryData) -> Result<()> {
        self.save(LIBRARY_FILE, data)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let (_dir, store) = make_test_store();
        assert_eq!(store.load_profile(), ProfileData::default());
        assert_eq!(store.load_longitudinal(), LongitudinalData::default());
        assert!(store.load_history().sessions.is_empty());
        assert!(store.load_library().snippets.is_empty());
    }

    #[test]
    fn test_profile_round_trip() {
        let (_dir, store) = make_test_store();
        let mut profile = ProfileData::default();
        profile.set_rating("go", 1180);
        profile.heatmap.record_miss('{', Some('['));
        profile.heatmap.record_hit('{');
        profile.weak_chars.insert(';');
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile();
        assert_eq!(loaded.rating("go"), 1180);
        assert_eq!(loaded.heatmap.error_rate('{'), 0.5);
        assert_eq!(loaded.heatmap.top_confusion('{'), Some(('[', 1)));
        assert!(loaded.weak_chars.contains(&';'));
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let (dir, store) = make_test_store();
        store.save_history(&SessionHistoryData::default()).unwrap();
        assert!(dir.path().join(HISTORY_FILE).exists());
        assert!(!dir.path().join("session_history.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let (dir, store) = make_test_store();
        fs::write(dir.path().join(PROFILE_FILE), "{not json").unwrap();
        assert_eq!(store.load_profile(), ProfileData::default());
    }

    #[test]
    fn test_stale_schema_resets() {
        let (dir, store) = make_test_store();
        fs::write(
            dir.path().join(LONGITUDINAL_FILE),
            r#"{"schema_version": 0, "session_timestamps": ["2026-01-01T00:00:00Z"]}"#,
        )
        .unwrap();
        assert!(store.load_longitudinal().session_timestamps.is_empty());
    }
}

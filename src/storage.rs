use crate::models::{History, HistoryOnDisk, Listing, ListingFile};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// JSON files shared by the collector and the viewer
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
    docs_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>, docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            docs_dir: docs_dir.into(),
        }
    }

    pub fn listings_path(&self) -> PathBuf {
        self.docs_dir.join("listings.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn new_listings_path(&self) -> PathBuf {
        self.data_dir.join("new_listings.json")
    }

    /// Previously published listings; empty when nothing was written yet.
    pub fn load_listings(&self) -> Result<Vec<Listing>> {
        let file: Option<ListingFile> = read_json(&self.listings_path())?;
        Ok(file.map(|f| f.listings).unwrap_or_default())
    }

    pub fn load_history(&self) -> Result<History> {
        let raw: Option<HistoryOnDisk> = read_json(&self.history_path())?;
        Ok(raw.map(History::from).unwrap_or_default())
    }

    pub fn save_listings(&self, file: &ListingFile) -> Result<()> {
        write_json_atomic(&self.listings_path(), file)?;
        info!("💾 Saved {} listings to {}", file.listings.len(), self.listings_path().display());
        Ok(())
    }

    pub fn save_new_listings(&self, listings: &[Listing]) -> Result<()> {
        write_json_atomic(&self.new_listings_path(), listings)?;
        debug!("Saved {} new listings", listings.len());
        Ok(())
    }

    pub fn save_history(&self, history: &History) -> Result<()> {
        write_json_atomic(&self.history_path(), history)?;
        info!("💾 History now holds {} ids", history.len());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(Some(value))
}

/// Write to a temp file in the target directory, then rename over the target,
/// so readers never see a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .and_then(|_| tmp.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;
    use chrono::{TimeZone, Utc};

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("data"), dir.path().join("docs"));
        (dir, store)
    }

    #[test]
    fn missing_files_load_empty() {
        let (_dir, store) = store();
        assert!(store.load_listings().unwrap().is_empty());
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn listing_file_survives_save_and_load() {
        let (_dir, store) = store();
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let mut a = listing("a", "Viabilis");
        a.first_seen = Some(now);
        a.title = "Appartement à Saint-Gilles".to_string();

        store.save_listings(&ListingFile::new(vec![a.clone()], 1, now)).unwrap();

        let raw = std::fs::read_to_string(store.listings_path()).unwrap();
        // UTF-8 kept verbatim, not \u-escaped
        assert!(raw.contains("Appartement à Saint-Gilles"));
        assert!(raw.contains("\"total_count\": 1"));
        assert_eq!(store.load_listings().unwrap(), vec![a]);
    }

    #[test]
    fn history_accepts_legacy_array() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.history_path().parent().unwrap()).unwrap();
        std::fs::write(store.history_path(), r#"["a1", "b2"]"#).unwrap();

        let history = store.load_history().unwrap();
        assert!(history.contains("a1") && history.contains("b2"));

        store.save_history(&history).unwrap();
        let reloaded = store.load_history().unwrap();
        assert_eq!(reloaded, history);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.history_path().parent().unwrap()).unwrap();
        std::fs::write(store.history_path(), "{ not json").unwrap();
        assert!(store.load_history().is_err());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let (dir, store) = store();
        store.save_new_listings(&[listing("x", "Modifa")]).unwrap();
        store.save_new_listings(&[]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("data")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read_to_string(store.new_listings_path()).unwrap().trim(), "[]");
    }
}

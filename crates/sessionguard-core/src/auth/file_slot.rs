use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::credentials::{CredentialSlot, ACCESS_TOKEN_KEY};

/// Application name used for the cache directory path
const APP_NAME: &str = "sessionguard";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotRecord {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Credential slot persisted as a small JSON file in the cache directory.
pub struct FileSlot {
    cache_dir: PathBuf,
}

impl FileSlot {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Slot under the user's cache directory, e.g. `~/.cache/sessionguard`
    pub fn default_location() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(Self::new(cache_dir.join(APP_NAME)))
    }

    /// When the current credential was written, if there is one
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.read_record().ok().flatten().map(|r| r.stored_at)
    }

    fn read_record(&self) -> Result<Option<SlotRecord>> {
        let path = self.slot_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read credential file")?;
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted credential file");
                Ok(None)
            }
        }
    }

    fn slot_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", ACCESS_TOKEN_KEY))
    }
}

impl CredentialSlot for FileSlot {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.read_record()?.map(|r| r.token))
    }

    fn store(&self, value: &str) -> Result<()> {
        let path = self.slot_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = SlotRecord {
            token: value.to_string(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&record)?;
        std::fs::write(path, contents).context("Failed to write credential file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.slot_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_slot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested"));
        assert_eq!(slot.load().unwrap(), None);
        assert!(slot.stored_at().is_none());

        slot.store("T1").unwrap();

        // A fresh handle on the same directory sees the same credential
        let reopened = FileSlot::new(dir.path().join("nested"));
        assert_eq!(reopened.load().unwrap().as_deref(), Some("T1"));
        assert!(reopened.stored_at().is_some());

        reopened.remove().unwrap();
        assert_eq!(slot.load().unwrap(), None);
        slot.remove().unwrap();
    }

    #[test]
    fn test_corrupted_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("access_token.json"), "{not json").unwrap();
        assert_eq!(slot.load().unwrap(), None);

        // Writing over it repairs the slot
        slot.store("T2").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("T2"));
    }
}

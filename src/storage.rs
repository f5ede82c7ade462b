use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use crate::sources::Platform;

/// One play of a track by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: u64,
    pub title: String,
    pub url: String,
    pub platform: Platform,
    pub played_at: DateTime<Utc>,
}

/// Durable "user played track X at time T" log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
}

/// History kept as one JSON file per user under `<data_dir>/history`.
pub struct JsonHistoryStore {
    dir: PathBuf,
    limit: usize,
    // Serialises read-modify-write cycles on the files
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub async fn new(data_dir: &Path, limit: usize) -> Result<Self> {
        let dir = data_dir.join("history");
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        info!("📁 History stored in: {}", dir.display());

        Ok(Self {
            dir,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        })
    }

    /// The user's last `n` plays, newest first.
    pub async fn recent(&self, user_id: u64, n: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.load(user_id).await?;
        Ok(entries.into_iter().rev().take(n).collect())
    }

    async fn load(&self, user_id: u64) -> Result<Vec<HistoryEntry>> {
        let path = self.user_file(user_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A corrupt file shouldn't block new plays from being recorded.
                warn!("Discarding unreadable history {}: {}", path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, user_id: u64, entries: &[HistoryEntry]) -> Result<()> {
        let path = self.user_file(user_id);
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn user_file(&self, user_id: u64) -> PathBuf {
        self.dir.join(format!("user_{}.json", user_id))
    }
}

#[async_trait]
impl HistorySink for JsonHistoryStore {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let user_id = entry.user_id;
        let mut entries = self.load(user_id).await?;
        entries.push(entry);
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }

        self.save(user_id, &entries).await?;
        debug!("💾 History for user {} now has {} entries", user_id, entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn entry(user_id: u64, title: &str, minute: u32) -> HistoryEntry {
        HistoryEntry {
            user_id,
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            platform: Platform::YouTube,
            played_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    fn titles(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path(), 200).await.unwrap();

        for (i, title) in ["a", "b", "c"].iter().enumerate() {
            store.record(entry(1, title, i as u32)).await.unwrap();
        }

        let recent = store.recent(1, 2).await.unwrap();
        assert_eq!(titles(&recent), vec!["c", "b"]);
        assert!(dir.path().join("history/user_1.json").exists());
    }

    #[tokio::test]
    async fn users_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path(), 200).await.unwrap();

        store.record(entry(1, "mine", 0)).await.unwrap();
        store.record(entry(2, "theirs", 1)).await.unwrap();

        assert_eq!(titles(&store.recent(1, 10).await.unwrap()), vec!["mine"]);
        assert_eq!(titles(&store.recent(2, 10).await.unwrap()), vec!["theirs"]);
        assert!(store.recent(3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oldest_entries_are_dropped_past_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path(), 2).await.unwrap();

        for (i, title) in ["a", "b", "c"].iter().enumerate() {
            store.record(entry(5, title, i as u32)).await.unwrap();
        }

        assert_eq!(titles(&store.recent(5, 10).await.unwrap()), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn entries_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonHistoryStore::new(dir.path(), 10).await.unwrap();
            store.record(entry(8, "kept", 3)).await.unwrap();
        }

        let store = JsonHistoryStore::new(dir.path(), 10).await.unwrap();
        let recent = store.recent(8, 1).await.unwrap();
        assert_eq!(recent, vec![entry(8, "kept", 3)]);
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced_on_next_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path(), 10).await.unwrap();
        std::fs::write(dir.path().join("history/user_4.json"), "not json").unwrap();

        assert!(store.recent(4, 5).await.unwrap().is_empty());
        store.record(entry(4, "fresh", 0)).await.unwrap();
        assert_eq!(titles(&store.recent(4, 5).await.unwrap()), vec!["fresh"]);
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, warn};

use super::CacheError;
use crate::models::{CheckoutKey, RawCheckout};

/// Bump when the snapshot layout changes. Snapshots written with another
/// version are discarded on load.
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata key holding the RFC 3339 time of the last successful refresh.
pub const LAST_FETCHED_KEY: &str = "lastFetchedDate";

const SNAPSHOT_FILE: &str = "checkouts.json";

/// On-disk form of the cache.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    checkouts: Vec<RawCheckout>,
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

/// Both collections as seen by one reader.
#[derive(Debug, Clone, Default)]
struct State {
    checkouts: BTreeMap<CheckoutKey, RawCheckout>,
    meta: BTreeMap<String, String>,
}

impl State {
    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SCHEMA_VERSION,
            checkouts: self.checkouts.values().cloned().collect(),
            meta: self.meta.clone(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            checkouts: snapshot
                .checkouts
                .into_iter()
                .map(|rec| (rec.key.clone(), rec))
                .collect(),
            meta: snapshot.meta,
        }
    }
}

/// Persistent store for raw checkouts and cache metadata.
///
/// Reads clone an `Arc` of the current state and never wait on disk I/O.
/// Every write builds a new state, persists it as a whole snapshot
/// (temp file then rename) and only then swaps it in, so readers see either
/// the old or the new state and a failed write leaves both memory and disk
/// untouched.
pub struct CacheStore {
    path: Option<PathBuf>,
    state: OnceCell<RwLock<Arc<State>>>,
    write_lock: Mutex<()>,
}

impl CacheStore {
    /// Store backed by `checkouts.json` in `cache_dir`.
    ///
    /// Nothing is read until first use and the directory is created on the
    /// first write.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Some(cache_dir.as_ref().join(SNAPSHOT_FILE)),
            state: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    async fn state(&self) -> Result<&RwLock<Arc<State>>, CacheError> {
        self.state
            .get_or_try_init(|| async {
                let state = match &self.path {
                    Some(path) => Self::load_snapshot(path).await?,
                    None => State::default(),
                };
                Ok::<_, CacheError>(RwLock::new(Arc::new(state)))
            })
            .await
    }

    async fn current(&self) -> Result<Arc<State>, CacheError> {
        Ok(Arc::clone(&*self.state().await?.read().await))
    }

    async fn load_snapshot(path: &Path) -> Result<State, CacheError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache snapshot yet");
                return Ok(State::default());
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let parse_err = |source| CacheError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let probe: VersionProbe = serde_json::from_str(&contents).map_err(parse_err)?;
        if probe.version != SCHEMA_VERSION {
            warn!(
                found = probe.version,
                expected = SCHEMA_VERSION,
                "Discarding cache snapshot with unsupported schema version"
            );
            return Ok(State::default());
        }

        let snapshot: Snapshot = serde_json::from_str(&contents).map_err(parse_err)?;
        debug!(count = snapshot.checkouts.len(), "Loaded cache snapshot");
        Ok(State::from_snapshot(snapshot))
    }

    async fn persist(&self, state: &State) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let write_err = |source| CacheError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let contents = serde_json::to_string_pretty(&state.to_snapshot())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        Ok(())
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    async fn update(&self, change: impl FnOnce(&mut State)) -> Result<(), CacheError> {
        let _writer = self.write_lock.lock().await;
        let cell = match self.state().await {
            Ok(cell) => cell,
            Err(CacheError::Parse { path, source }) => {
                // The write replaces whatever was unreadable
                warn!(path = %path.display(), error = %source, "Overwriting unreadable cache snapshot");
                let _ = self.state.set(RwLock::new(Arc::new(State::default())));
                self.state().await?
            }
            Err(e) => return Err(e),
        };

        let mut next = State::clone(&*cell.read().await);
        change(&mut next);

        self.persist(&next).await?;
        *cell.write().await = Arc::new(next);
        Ok(())
    }

    // ===== Checkouts =====

    /// Insert or overwrite each record by key. Records not in `records` stay.
    pub async fn put_raw(&self, records: &[RawCheckout]) -> Result<(), CacheError> {
        self.update(|state| {
            for rec in records {
                state.checkouts.insert(rec.key.clone(), rec.clone());
            }
        })
        .await
    }

    /// All stored records, in key order.
    pub async fn get_all_raw(&self) -> Result<Vec<RawCheckout>, CacheError> {
        Ok(self.current().await?.checkouts.values().cloned().collect())
    }

    pub async fn clear_all(&self) -> Result<(), CacheError> {
        self.update(|state| state.checkouts.clear()).await
    }

    /// Swap in a complete refresh result and stamp it as fetched at
    /// `fetched_at`, as a single write.
    pub async fn replace_all(
        &self,
        records: Vec<RawCheckout>,
        fetched_at: DateTime<Local>,
    ) -> Result<(), CacheError> {
        self.update(|state| {
            state.checkouts = records
                .into_iter()
                .map(|rec| (rec.key.clone(), rec))
                .collect();
            state
                .meta
                .insert(LAST_FETCHED_KEY.to_string(), fetched_at.to_rfc3339());
        })
        .await
    }

    // ===== Metadata =====

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.current().await?.meta.get(key).cloned())
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.update(|state| {
            state.meta.insert(key.to_string(), value.to_string());
        })
        .await
    }

    pub async fn last_fetched(&self) -> Result<Option<String>, CacheError> {
        self.get_meta(LAST_FETCHED_KEY).await
    }
}

/// Human-readable age of the cache, e.g. `5m ago` or `2h ago`.
pub fn age_display(fetched_at: DateTime<Local>, now: DateTime<Local>) -> String {
    let minutes = (now - fetched_at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn record(account: &str, metadata: &str, title: &str) -> RawCheckout {
        RawCheckout {
            key: CheckoutKey::new(account, metadata),
            times_renewed: 1,
            due_date: "2024-01-10T00:00:00-08:00".to_string(),
            title: title.to_string(),
            cover_url: Some(format!("https://covers.example/{metadata}.jpg")),
        }
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_unchanged() {
        let store = CacheStore::in_memory();
        let rec = record("a", "S1", "Dune");

        store.put_raw(&[rec.clone()]).await.unwrap();

        assert_eq!(store.get_all_raw().await.unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn test_put_raw_upserts_and_keeps_absent_records() {
        let store = CacheStore::in_memory();
        store
            .put_raw(&[record("a", "S1", "Dune"), record("a", "S2", "Emma")])
            .await
            .unwrap();

        store.put_raw(&[record("a", "S1", "Dune Messiah")]).await.unwrap();

        let all = store.get_all_raw().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Dune Messiah");
        assert_eq!(all[1].title, "Emma");
    }

    #[tokio::test]
    async fn test_same_item_on_two_accounts_is_two_records() {
        let store = CacheStore::in_memory();
        store
            .put_raw(&[record("a", "S1", "Dune"), record("b", "S1", "Dune")])
            .await
            .unwrap();
        assert_eq!(store.get_all_raw().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_keeps_meta() {
        let store = CacheStore::in_memory();
        store.put_raw(&[record("a", "S1", "Dune")]).await.unwrap();
        store.set_meta("k", "v").await.unwrap();

        store.clear_all().await.unwrap();

        assert!(store.get_all_raw().await.unwrap().is_empty());
        assert_eq!(store.get_meta("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_meta_absent_until_set() {
        let store = CacheStore::in_memory();
        assert_eq!(store.last_fetched().await.unwrap(), None);

        store.set_meta(LAST_FETCHED_KEY, "2024-01-01T00:00:00Z").await.unwrap();
        assert_eq!(
            store.last_fetched().await.unwrap().as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_replace_all_swaps_records_and_stamps_meta() {
        let store = CacheStore::in_memory();
        store
            .put_raw(&[record("a", "S1", "Dune"), record("a", "S2", "Emma")])
            .await
            .unwrap();

        let now = Local::now();
        store
            .replace_all(vec![record("b", "S9", "Ulysses")], now)
            .await
            .unwrap();

        let all = store.get_all_raw().await.unwrap();
        assert_eq!(all, vec![record("b", "S9", "Ulysses")]);
        assert_eq!(store.last_fetched().await.unwrap(), Some(now.to_rfc3339()));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let now = Local::now();
        {
            let store = CacheStore::new(dir.path().join("cache"));
            store
                .replace_all(vec![record("a", "S1", "Dune")], now)
                .await
                .unwrap();
        }

        let reopened = CacheStore::new(dir.path().join("cache"));
        assert_eq!(
            reopened.get_all_raw().await.unwrap(),
            vec![record("a", "S1", "Dune")]
        );
        assert_eq!(reopened.last_fetched().await.unwrap(), Some(now.to_rfc3339()));
        assert!(!dir.path().join("cache").join("checkouts.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_cache() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.get_all_raw().await.unwrap().is_empty());
        assert_eq!(store.last_fetched().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_schema_version_is_discarded() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SNAPSHOT_FILE),
            r#"{"version": 0, "checkouts": [], "meta": {"lastFetchedDate": "2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let store = CacheStore::new(dir.path());
        assert_eq!(store.last_fetched().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_storage_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "{not json").unwrap();

        let store = CacheStore::new(dir.path());
        let err = store.get_all_raw().await.unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_write_replaces_corrupt_snapshot() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "{not json").unwrap();

        let store = CacheStore::new(dir.path());
        store
            .replace_all(vec![record("a", "S1", "Dune")], Local::now())
            .await
            .unwrap();

        let reopened = CacheStore::new(dir.path());
        assert_eq!(reopened.get_all_raw().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        // A directory where the temp snapshot file should go
        std::fs::create_dir(dir.path().join("checkouts.json.tmp")).unwrap();

        let store = CacheStore::new(dir.path());
        let err = store
            .replace_all(vec![record("a", "S1", "Dune")], Local::now())
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Write { .. }));
        assert!(store.get_all_raw().await.unwrap().is_empty());
        assert_eq!(store.last_fetched().await.unwrap(), None);
    }

    #[test]
    fn test_age_display() {
        let now = Local::now();
        assert_eq!(age_display(now, now), "just now");
        assert_eq!(age_display(now + Duration::minutes(5), now), "just now");
        assert_eq!(age_display(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(age_display(now - Duration::minutes(90), now), "2h ago");
        assert_eq!(age_display(now - Duration::minutes(130), now), "2h ago");
        assert_eq!(age_display(now - Duration::days(3), now), "3d ago");
    }
}

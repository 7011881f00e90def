//! Stale-while-revalidate loading of checkouts.
//!
//! `SyncEngine::load` always answers from the cache first, then decides
//! whether the cache is stale. A stale cache is refreshed by a background
//! task that fetches every account in turn, swaps the result into the cache
//! and pushes the new view through the same event channel.
//!
//! An unreadable cache is reported but never blocks the refresh, since the
//! refresh is what overwrites it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Clock, SyncError, SyncEvent, SyncStatus, SystemClock};
use crate::assemble::assemble;
use crate::cache::{is_fresh, CacheStore};
use crate::models::Account;
use crate::source::CheckoutSource;

/// Where the engine is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    ServingCache,
    Refreshing,
}

/// What a call to `load` set in motion.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Cache was fresh; nothing to fetch
    Fresh,
    /// Another load's refresh is still running and will emit the update
    AlreadyRefreshing,
    /// A refresh was started in the background
    Refreshing(JoinHandle<Result<(), SyncError>>),
}

impl LoadOutcome {
    /// Wait for the background refresh, if one was started.
    pub async fn wait(self) -> Result<(), SyncError> {
        match self {
            LoadOutcome::Refreshing(handle) => handle.await?,
            LoadOutcome::Fresh | LoadOutcome::AlreadyRefreshing => Ok(()),
        }
    }

    pub fn started_refresh(&self) -> bool {
        matches!(self, LoadOutcome::Refreshing(_))
    }
}

/// Held for the lifetime of one refresh; releases the lock when dropped,
/// including when the refresh fails or panics.
struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl RefreshGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Everything a background refresh needs, detached from the engine.
struct RefreshTask {
    cache: Arc<CacheStore>,
    source: Arc<dyn CheckoutSource>,
    accounts: Arc<Vec<Account>>,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<SyncEvent>,
    publish: Arc<Mutex<()>>,
}

pub struct SyncEngine {
    cache: Arc<CacheStore>,
    source: Arc<dyn CheckoutSource>,
    accounts: Arc<Vec<Account>>,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<SyncEvent>,
    refreshing: Arc<AtomicBool>,
    serving: AtomicUsize,
    /// Held from reading the cache to emitting its view, so a cached view
    /// can never be emitted after the refreshed one that replaced it.
    publish: Arc<Mutex<()>>,
}

/// Helper to send events, logging any channel errors
async fn send_event(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    if let Err(e) = tx.send(event).await {
        error!(error = %e, "Failed to send sync event - channel closed");
    }
}

impl SyncEngine {
    pub fn new(
        cache: Arc<CacheStore>,
        source: Arc<dyn CheckoutSource>,
        accounts: Vec<Account>,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            cache,
            source,
            accounts: Arc::new(accounts),
            clock: Arc::new(SystemClock),
            events,
            refreshing: Arc::new(AtomicBool::new(false)),
            serving: AtomicUsize::new(0),
            publish: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> EngineState {
        if self.refreshing.load(Ordering::Acquire) {
            EngineState::Refreshing
        } else if self.serving.load(Ordering::Acquire) > 0 {
            EngineState::ServingCache
        } else {
            EngineState::Idle
        }
    }

    /// Show checkouts, refreshing them if the cache is from an earlier day.
    pub async fn view_checkouts(&self) -> LoadOutcome {
        self.load(false).await
    }

    /// Show cached checkouts, then refresh them regardless of age.
    pub async fn force_refresh(&self) -> LoadOutcome {
        self.load(true).await
    }

    /// Emit the cached view, then start a refresh if one is needed.
    ///
    /// Returns once the cached view has been emitted, or an error status in
    /// its place. Overlapping calls share the refresh already in flight
    /// instead of starting another.
    pub async fn load(&self, force: bool) -> LoadOutcome {
        let now = self.clock.now();
        send_event(&self.events, SyncEvent::Status(SyncStatus::Loading)).await;

        self.serving.fetch_add(1, Ordering::AcqRel);
        let served = self.serve_cache(now).await;
        self.serving.fetch_sub(1, Ordering::AcqRel);
        if let Err(e) = &served {
            self.report(e).await;
        }

        let Some(guard) = RefreshGuard::try_acquire(&self.refreshing) else {
            debug!("Refresh already in progress, not starting another");
            return LoadOutcome::AlreadyRefreshing;
        };

        let last_fetched = match self.cache.last_fetched().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Could not read last refresh time, treating cache as stale");
                None
            }
        };

        if is_fresh(last_fetched.as_deref(), now, force) {
            debug!(last_fetched = ?last_fetched, "Cache is fresh");
            if served.is_ok() {
                send_event(&self.events, SyncEvent::Status(SyncStatus::Idle)).await;
            }
            return LoadOutcome::Fresh;
        }

        info!(force, accounts = self.accounts.len(), "Starting background refresh");
        let task = RefreshTask {
            cache: Arc::clone(&self.cache),
            source: Arc::clone(&self.source),
            accounts: Arc::clone(&self.accounts),
            clock: Arc::clone(&self.clock),
            events: self.events.clone(),
            publish: Arc::clone(&self.publish),
        };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.run().await
        });

        LoadOutcome::Refreshing(handle)
    }

    async fn serve_cache(&self, now: DateTime<Local>) -> Result<(), SyncError> {
        let _publishing = self.publish.lock().await;
        let records = self.cache.get_all_raw().await?;
        let view = assemble(&records, now)?;
        debug!(count = view.len(), "Serving cached checkouts");
        send_event(&self.events, SyncEvent::view(view)).await;
        Ok(())
    }

    async fn report(&self, e: &SyncError) {
        warn!(error = %e, "Failed to load cached checkouts");
        send_event(&self.events, SyncEvent::Status(SyncStatus::Error(e.to_string()))).await;
    }
}

impl RefreshTask {
    async fn run(self) -> Result<(), SyncError> {
        match self.refresh().await {
            Ok(count) => {
                info!(count, "Background refresh complete");
                send_event(&self.events, SyncEvent::Status(SyncStatus::Idle)).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Background refresh failed");
                send_event(&self.events, SyncEvent::Status(SyncStatus::Error(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }

    /// Fetch every account, then replace the cache and emit the new view.
    ///
    /// Accounts are fetched one at a time because the source shares a
    /// single login session. Any account-level failure abandons the pass
    /// before the cache is touched.
    async fn refresh(&self) -> Result<usize, SyncError> {
        let mut records = Vec::new();

        for account in self.accounts.iter() {
            let label = account.label().to_string();
            send_event(
                &self.events,
                SyncEvent::Status(SyncStatus::UpdatingAccount(label.clone())),
            )
            .await;

            let response = self
                .source
                .fetch_checkouts(account)
                .await
                .map_err(|source| SyncError::Source {
                    account: label.clone(),
                    source,
                })?;

            let extracted = response.extract(account);
            for skipped in &extracted.skipped {
                warn!(account = %label, error = %skipped, "Skipping malformed checkout");
            }
            debug!(account = %label, count = extracted.records.len(), "Fetched checkouts");
            records.extend(extracted.records);
        }

        let mut seen = HashSet::new();
        records.retain(|rec| seen.insert(rec.key.clone()));

        let now = self.clock.now();
        let view = assemble(&records, now)?;
        let count = view.len();

        let _publishing = self.publish.lock().await;
        self.cache.replace_all(records, now).await?;
        send_event(&self.events, SyncEvent::view(view)).await;
        Ok(count)
    }
}

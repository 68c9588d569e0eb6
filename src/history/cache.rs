//! Read-through cache over the session list endpoint.
//!
//! Pages are keyed by [`PageKey`]. A page younger than the staleness window
//! is served without a network call. Concurrent requests for the same key
//! share one flight, and flights run on their own task so a caller that
//! stops waiting does not cancel the fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::{ApiError, OnboardingApi};
use crate::config::HistoryConfig;
use crate::types::{PageKey, PaginatedPage, Session};

type Flight = Shared<BoxFuture<'static, Result<PaginatedPage, ApiError>>>;

/// Freshness and retry settings
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Pages younger than this are served from cache
    pub staleness: Duration,
    /// Additional attempts after the first failed fetch
    pub max_retries: usize,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Pages kept before the least recently fetched one is evicted
    pub max_pages: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(2),
            max_pages: 64,
        }
    }
}

impl CachePolicy {
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self {
            staleness: Duration::from_secs(config.staleness_secs),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
            max_pages: config.max_cached_pages.max(1),
        }
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Observable state of a cached page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Stale,
    Invalidated,
}

/// Which cached pages an invalidation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Every page
    All,
    /// Exactly one page
    Key(PageKey),
    /// Every page and page size for one filter datetime
    Filter(Option<DateTime<Utc>>),
}

impl InvalidationScope {
    fn matches(&self, key: &PageKey) -> bool {
        match self {
            InvalidationScope::All => true,
            InvalidationScope::Key(k) => k == key,
            InvalidationScope::Filter(filter) => key.filter == *filter,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: PaginatedPage,
    fetched_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    fn new(value: PaginatedPage) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            invalidated: false,
        }
    }

    fn state(&self, staleness: Duration) -> CacheState {
        if self.invalidated {
            CacheState::Invalidated
        } else if self.fetched_at.elapsed() < staleness {
            CacheState::Fresh
        } else {
            CacheState::Stale
        }
    }
}

#[derive(Default)]
struct CacheInner {
    pages: HashMap<PageKey, CacheEntry>,
    /// Registered flight per key, tagged with its id
    in_flight: HashMap<PageKey, (u64, Flight)>,
    sessions: HashMap<Uuid, Session>,
    next_flight_id: u64,
}

impl CacheInner {
    /// Insert a fetched page, evicting the oldest entries beyond `max_pages`
    fn store(&mut self, key: PageKey, page: PaginatedPage, max_pages: usize) {
        self.pages.insert(key, CacheEntry::new(page));
        while self.pages.len() > max_pages {
            let Some(oldest) = self
                .pages
                .iter()
                .min_by_key(|(_, entry)| entry.fetched_at)
                .map(|(key, _)| *key)
            else {
                break;
            };
            self.pages.remove(&oldest);
            debug!(page = oldest.page, "evicted history page");
        }
    }
}

/// Cached, retry-aware read path over the session history
pub struct SessionCache {
    api: Arc<dyn OnboardingApi>,
    policy: CachePolicy,
    inner: Arc<Mutex<CacheInner>>,
}

impl SessionCache {
    pub fn new(api: Arc<dyn OnboardingApi>, policy: CachePolicy) -> Self {
        Self {
            api,
            policy,
            inner: Arc::new(Mutex::new(CacheInner::default())),
        }
    }

    /// Return the page for `key`, fetching it when not fresh
    pub async fn fetch_page(&self, key: PageKey) -> Result<PaginatedPage, ApiError> {
        let flight = {
            let mut inner = self.inner.lock().await;

            if let Some(entry) = inner.pages.get(&key) {
                if entry.state(self.policy.staleness) == CacheState::Fresh {
                    debug!(page = key.page, "history cache hit");
                    return Ok(entry.value.clone());
                }
            }

            if let Some((id, flight)) = inner.in_flight.get(&key) {
                debug!(page = key.page, flight = id, "joining in-flight history fetch");
                flight.clone()
            } else {
                let id = inner.next_flight_id;
                inner.next_flight_id += 1;
                debug!(page = key.page, flight = id, "history cache miss");
                let flight = self.start_flight(key, id);
                inner.in_flight.insert(key, (id, flight.clone()));
                flight
            }
        };

        flight.await
    }

    fn start_flight(&self, key: PageKey, id: u64) -> Flight {
        let api = Arc::clone(&self.api);
        let inner = Arc::clone(&self.inner);
        let policy = self.policy.clone();

        let handle = tokio::spawn(async move {
            let result = fetch_with_retry(api.as_ref(), &key, &policy).await;

            let mut inner = inner.lock().await;
            let registered = matches!(inner.in_flight.get(&key), Some((current, _)) if *current == id);
            if registered {
                inner.in_flight.remove(&key);
                if let Ok(page) = &result {
                    inner.store(key, page.clone(), policy.max_pages);
                }
            } else {
                debug!(page = key.page, flight = id, "discarding detached history fetch");
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::unknown(format!("history fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }

    /// Mark matching pages invalidated and detach matching flights
    pub async fn invalidate(&self, scope: InvalidationScope) {
        let mut inner = self.inner.lock().await;
        let mut marked = 0;
        for (key, entry) in inner.pages.iter_mut() {
            if scope.matches(key) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        inner.in_flight.retain(|key, _| !scope.matches(key));
        debug!(?scope, marked, "history cache invalidated");
    }

    /// Current state of the page cached for `key`, if any
    pub async fn entry_state(&self, key: &PageKey) -> Option<CacheState> {
        let inner = self.inner.lock().await;
        inner
            .pages
            .get(key)
            .map(|entry| entry.state(self.policy.staleness))
    }

    /// Fetch one session, served from cache once seen
    pub async fn session(&self, id: Uuid) -> Result<Session, ApiError> {
        if let Some(session) = self.inner.lock().await.sessions.get(&id) {
            debug!(%id, "session cache hit");
            return Ok(session.clone());
        }

        let session = self.api.get_session(id).await?;
        self.inner
            .lock()
            .await
            .sessions
            .insert(id, session.clone());
        Ok(session)
    }

    /// Seed the session cache, as after a successful create
    pub async fn prime_session(&self, session: Session) {
        self.inner.lock().await.sessions.insert(session.id, session);
    }

    /// Delete a session remotely, evict it and invalidate every page
    pub async fn delete_session(&self, id: Uuid) -> Result<(), ApiError> {
        let result = self.api.delete_session(id).await;
        let gone = match &result {
            Ok(()) => true,
            Err(e) => e.is_not_found(),
        };
        if gone {
            self.inner.lock().await.sessions.remove(&id);
            self.invalidate(InvalidationScope::All).await;
        }
        result
    }
}

async fn fetch_with_retry(
    api: &dyn OnboardingApi,
    key: &PageKey,
    policy: &CachePolicy,
) -> Result<PaginatedPage, ApiError> {
    let op = || async { api.list_sessions(key).await };

    op.retry(policy.retry_strategy())
        .when(ApiError::is_retryable)
        .notify(|err, dur| {
            warn!("Retrying history page {} after {:?}: {}", key.page, dur, err);
        })
        .await
}

//! Client facade: wires the session store, the cache registry and the HTTP
//! client into one handle.
//!
//! The facade owns the coupling rules between the three parts. Session
//! transitions drive the registry and the HTTP token slot through a single
//! listener, registered here, which runs inside the transition critical
//! section in a fixed order: fence in-flight fetches, swap the bearer token,
//! then drop every cached entry. Consumers that read through the facade
//! therefore never observe one identity's token paired with another
//! identity's cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{
    AuthError, CredentialStore, PersistedSessionRepository, Session, SessionEvent,
    SessionSnapshot, SessionStore,
};
use crate::cache::{CacheRegistry, CacheTag, TagStatus};
use crate::config::Config;
use crate::models::{
    Announcement, CanId, CategoryFilter, Comment, CustomerAddress, DigitalStamp, Document,
    MarketplaceItem, Notification, Order, Profile, VendorOrder, VendorStoreReview, Voucher,
};
use crate::storage::{FileStore, SealedStore, StorageBackend};

/// Maximum concurrent API requests during a sync sweep.
/// Keeps a full warm-up from hammering the backend or tripping rate limits.
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Maximum order comment threads warmed per sync.
/// Old orders rarely get new comments; capping the sweep keeps sync bounded
/// on accounts with a long order history.
const MAX_COMMENT_THREADS_PER_SYNC: usize = 25;

/// Outcome of a [`VendClient::sync_all`] sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// The single handle consumers hold. Cheap to share behind an `Arc`.
pub struct VendClient {
    config: Config,
    api: ApiClient,
    store: Arc<SessionStore>,
    registry: Arc<CacheRegistry>,
}

impl VendClient {
    /// Build the client and reconcile any persisted session before
    /// returning, so callers never observe the pre-restore state.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let api = ApiClient::new(config.api_base_url()).context("Failed to build API client")?;
        let data_dir = config.data_dir()?;
        let storage = Self::open_storage(&config, data_dir).await?;
        let repository = PersistedSessionRepository::new(storage);
        let store = Arc::new(SessionStore::new(api.clone(), repository));
        let registry = Arc::new(CacheRegistry::new());
        Self::wire_invalidation(&store, &registry, &api);

        let client = Self {
            config,
            api,
            store,
            registry,
        };
        client.restore_session().await;
        Ok(client)
    }

    async fn open_storage(config: &Config, data_dir: PathBuf) -> Result<StorageBackend> {
        if config.seal_storage {
            let passphrase = CredentialStore::seal_passphrase()?;
            let sealed = SealedStore::open(data_dir, &passphrase)
                .await
                .context("Failed to open sealed storage")?;
            Ok(StorageBackend::Sealed(sealed))
        } else {
            Ok(StorageBackend::File(FileStore::new(data_dir)))
        }
    }

    /// Couple session transitions to the cache and the HTTP client. The
    /// listener runs inside the transition critical section, so the three
    /// updates land atomically with the session change.
    fn wire_invalidation(store: &Arc<SessionStore>, registry: &Arc<CacheRegistry>, api: &ApiClient) {
        let registry = Arc::clone(registry);
        let api = api.clone();
        store.on_transition(move |event| {
            // Order matters: fence first so no in-flight fetch can land
            // between the token swap and the sweep.
            registry.abort_in_flight();
            match event {
                SessionEvent::Committed(session) => api.set_token(session.token.clone()),
                SessionEvent::Cleared => api.clear_token(),
            }
            registry.invalidate_all();
        });
    }

    async fn restore_session(&self) {
        self.store.restore().await;
        // Restore bypasses the listener path, so a restored token has to be
        // handed to the HTTP client directly. Nothing is cached yet.
        if let Some(session) = self.store.snapshot().session {
            self.api.set_token(session.token);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== Session Surface =====

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    /// Register a listener for session transitions. Runs synchronously inside
    /// the transition critical section; it must not call back into the client.
    pub fn on_session_transition(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.store.on_transition(listener);
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.store.login(email, password).await
    }

    pub async fn logout(&self) {
        self.store.logout().await;
    }

    // ===== Account Endpoints =====

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), ApiError> {
        self.api.register(email, password, display_name).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.api.forgot_password(email).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        self.api.reset_password(token, new_password).await
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        self.api.verify_email(token).await
    }

    // ===== Cached Data Accessors =====

    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.cached_fetch(CacheTag::Order, "", || self.api.fetch_orders())
            .await
    }

    pub async fn vendor_orders(&self) -> Result<Vec<VendorOrder>, ApiError> {
        self.cached_fetch(CacheTag::VendorOrder, "", || self.api.fetch_vendor_orders())
            .await
    }

    pub async fn can_ids(&self) -> Result<Vec<CanId>, ApiError> {
        self.cached_fetch(CacheTag::CanId, "", || self.api.fetch_can_ids())
            .await
    }

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.cached_fetch(CacheTag::Profile, "", || self.api.fetch_profile())
            .await
    }

    pub async fn marketplace_items(&self) -> Result<Vec<MarketplaceItem>, ApiError> {
        self.cached_fetch(CacheTag::Marketplace, "", || self.api.fetch_marketplace())
            .await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.cached_fetch(CacheTag::Notifications, "", || self.api.fetch_notifications())
            .await
    }

    /// Comment thread for one order. Threads are cached per order id under
    /// the shared `comments` tag.
    pub async fn order_comments(&self, order_id: i64) -> Result<Vec<Comment>, ApiError> {
        let params = order_id.to_string();
        self.cached_fetch(CacheTag::Comments, &params, || self.api.fetch_comments(order_id))
            .await
    }

    pub async fn documents(&self) -> Result<Vec<Document>, ApiError> {
        self.cached_fetch(CacheTag::Documents, "", || self.api.fetch_documents())
            .await
    }

    pub async fn announcements(&self) -> Result<Vec<Announcement>, ApiError> {
        self.cached_fetch(CacheTag::Announcements, "", || self.api.fetch_announcements())
            .await
    }

    pub async fn digital_stamps(&self) -> Result<Vec<DigitalStamp>, ApiError> {
        self.cached_fetch(CacheTag::DigitalStamp, "", || self.api.fetch_digital_stamps())
            .await
    }

    pub async fn vouchers(&self) -> Result<Vec<Voucher>, ApiError> {
        self.cached_fetch(CacheTag::Voucher, "", || self.api.fetch_vouchers())
            .await
    }

    pub async fn category_filters(&self) -> Result<Vec<CategoryFilter>, ApiError> {
        self.cached_fetch(CacheTag::CategoryFilter, "", || {
            self.api.fetch_category_filters()
        })
        .await
    }

    pub async fn customer_addresses(&self) -> Result<Vec<CustomerAddress>, ApiError> {
        self.cached_fetch(CacheTag::CustomerAddress, "", || {
            self.api.fetch_customer_addresses()
        })
        .await
    }

    pub async fn vendor_store_reviews(&self) -> Result<Vec<VendorStoreReview>, ApiError> {
        self.cached_fetch(CacheTag::VendorStoreReview, "", || {
            self.api.fetch_vendor_store_reviews()
        })
        .await
    }

    // ===== Cache Control =====

    /// Mark the given tags stale and drop their entries. The next read for
    /// any of them refetches.
    pub fn invalidate(&self, tags: &[CacheTag]) {
        self.registry.invalidate(tags);
    }

    /// Per-tag freshness and entry counts, for status displays.
    pub fn cache_overview(&self) -> Vec<(CacheTag, TagStatus)> {
        CacheTag::ALL
            .into_iter()
            .map(|tag| (tag, self.registry.tag_status(tag)))
            .collect()
    }

    /// Refetch every stale dataset with bounded concurrency, then warm the
    /// comment threads of the most recent cached orders. Individual failures
    /// are logged and counted, not propagated.
    pub async fn sync_all(&self) -> SyncReport {
        if !self.store.snapshot().is_authenticated {
            warn!("Not authenticated; skipping sync");
            return SyncReport::default();
        }
        info!("Starting cache sync");

        let stale: Vec<CacheTag> = CacheTag::ALL
            .into_iter()
            .filter(|tag| *tag != CacheTag::Comments && !self.registry.is_fresh(*tag))
            .collect();

        let mut report = stream::iter(stale)
            .map(|tag| async move {
                match self.warm_tag(tag).await {
                    Ok(()) => {
                        debug!(%tag, "Dataset refreshed");
                        true
                    }
                    Err(error) => {
                        warn!(%tag, %error, "Dataset refresh failed");
                        false
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .fold(SyncReport::default(), |mut report, ok| async move {
                if ok {
                    report.refreshed += 1;
                } else {
                    report.failed += 1;
                }
                report
            })
            .await;

        // Comment threads come from the order list we just warmed. Cached
        // threads are served without a request, so this only costs network
        // for threads swept by the last transition.
        if let Some(entry) = self.registry.lookup(CacheTag::Order, "") {
            if let Ok(orders) = serde_json::from_value::<Vec<Order>>(entry.value) {
                report = stream::iter(
                    orders
                        .into_iter()
                        .take(MAX_COMMENT_THREADS_PER_SYNC)
                        .map(|order| order.id),
                )
                .map(|order_id| async move {
                    match self.order_comments(order_id).await {
                        Ok(_) => true,
                        Err(error) => {
                            warn!(order_id, %error, "Comment thread refresh failed");
                            false
                        }
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_REQUESTS)
                .fold(report, |mut report, ok| async move {
                    if ok {
                        report.refreshed += 1;
                    } else {
                        report.failed += 1;
                    }
                    report
                })
                .await;
            }
        }

        info!(
            refreshed = report.refreshed,
            failed = report.failed,
            "Cache sync complete"
        );
        report
    }

    async fn warm_tag(&self, tag: CacheTag) -> Result<(), ApiError> {
        match tag {
            CacheTag::Order => self.orders().await.map(|_| ()),
            CacheTag::VendorOrder => self.vendor_orders().await.map(|_| ()),
            CacheTag::CanId => self.can_ids().await.map(|_| ()),
            CacheTag::Profile => self.profile().await.map(|_| ()),
            CacheTag::Marketplace => self.marketplace_items().await.map(|_| ()),
            CacheTag::Notifications => self.notifications().await.map(|_| ()),
            // Threads are warmed from the cached order list, not here.
            CacheTag::Comments => Ok(()),
            CacheTag::Documents => self.documents().await.map(|_| ()),
            CacheTag::Announcements => self.announcements().await.map(|_| ()),
            CacheTag::DigitalStamp => self.digital_stamps().await.map(|_| ()),
            CacheTag::Voucher => self.vouchers().await.map(|_| ()),
            CacheTag::CategoryFilter => self.category_filters().await.map(|_| ()),
            CacheTag::CustomerAddress => self.customer_addresses().await.map(|_| ()),
            CacheTag::VendorStoreReview => self.vendor_store_reviews().await.map(|_| ()),
        }
    }

    /// Serve from cache when an entry exists, otherwise fetch under a ticket
    /// and cache the result. A result whose ticket was fenced off by a
    /// session transition is discarded and reported as [`ApiError::Superseded`]:
    /// it was fetched as the previous identity.
    async fn cached_fetch<T, F, Fut>(
        &self,
        tag: CacheTag,
        params: &str,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        if let Some(entry) = self.registry.lookup(tag, params) {
            match serde_json::from_value(entry.value) {
                Ok(value) => {
                    debug!(%tag, params, "Serving cached value");
                    return Ok(value);
                }
                Err(error) => {
                    warn!(%tag, %error, "Cached value failed to decode; refetching");
                }
            }
        }

        let ticket = self.registry.begin_fetch();
        let value = fetch().await?;
        let json = serde_json::to_value(&value)
            .map_err(|e| ApiError::InvalidResponse(format!("could not encode {tag}: {e}")))?;
        if !self.registry.complete_fetch(ticket, tag, params, json) {
            return Err(ApiError::Superseded);
        }
        Ok(value)
    }

    /// One atomic observation of session, token slot and registry, taken
    /// under the state lock so a transition cannot run mid-read.
    #[cfg(test)]
    pub(crate) fn coherence_snapshot(&self) -> CoherenceSnapshot {
        self.store.with_state(|session, epoch| CoherenceSnapshot {
            epoch,
            session_token: session.map(|s| s.token.clone()),
            client_token: self.api.current_token(),
            generation: self.registry.generation(),
            entry_generations: self.registry.entry_generations(),
        })
    }
}

#[cfg(test)]
pub(crate) struct CoherenceSnapshot {
    pub epoch: u64,
    pub session_token: Option<String>,
    pub client_token: Option<String>,
    pub generation: u64,
    pub entry_generations: Vec<u64>,
}

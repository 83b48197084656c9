//! Cache client implementation
//!
//! This module provides the `CacheClient`, a façade over one key-value store
//! connection that adds TTL policy, JSON-aware reads, and bookkeeping of the
//! keys it wrote so they can be evicted in bulk later.
//!
//! Every store command goes through a single worker task in submission order.
//! Fluent methods (`set`, `expire`, `delete_keys`, ...) enqueue their command
//! and return immediately; their failures are logged and kept until
//! [`CacheClient::wait_pending`] collects them. Async methods enqueue behind
//! earlier writes, so a `get` always observes the `set`s issued before it.

use crate::errors::CacheError;
use crate::options::{normalize_ttl, ttl_seconds, CacheOptions};
use crate::redis_store::RedisStore;
use crate::store::{KeyTtl, KeyValueStore};
use crate::tracker::KeyTracker;
use crate::value::CachedValue;
use config::CacheConfig;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce(Arc<dyn KeyValueStore>) -> BoxFuture<'static, ()> + Send>;

struct ClientInner {
    jobs: mpsc::UnboundedSender<Job>,
    database: AtomicI64,
    default_ttl: Option<Duration>,
    tracker: KeyTracker,
    failures: Arc<Mutex<Vec<CacheError>>>,
}

/// Cache client bound to one logical database.
///
/// Cloning is cheap; clones share the connection, the worker and the
/// tracked-key manifest.
#[derive(Clone)]
pub struct CacheClient {
    inner: Arc<ClientInner>,
}

impl Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("database", &self.database())
            .field("default_ttl", &self.inner.default_ttl)
            .field("tracked_keys", &self.inner.tracker.len())
            .field("worker_alive", &!self.inner.jobs.is_closed())
            .finish()
    }
}

impl CacheClient {
    /// Create a client over `store` and select `options.database`.
    ///
    /// The worker runs on the current Tokio runtime; without one this fails
    /// with [`CacheError::NoRuntime`]. A failed selection is logged, not
    /// returned; the client keeps working against whatever database the
    /// connection is on.
    pub fn new(store: Arc<dyn KeyValueStore>, options: CacheOptions) -> Result<Self, CacheError> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (jobs, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(store, receiver));

        let client = Self {
            inner: Arc::new(ClientInner {
                jobs,
                database: AtomicI64::new(options.database),
                default_ttl: normalize_ttl(options.default_ttl),
                tracker: KeyTracker::new(),
                failures: Arc::new(Mutex::new(Vec::new())),
            }),
        };
        client.select_database(options.database);
        Ok(client)
    }

    /// Create a client over a Redis connection described by `config`
    pub fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let store = RedisStore::new(config)?;
        Self::new(Arc::new(store), CacheOptions::from(config))
    }

    /// Database this client operates against
    pub fn database(&self) -> i64 {
        self.inner.database.load(Ordering::SeqCst)
    }

    /// TTL applied to writes that do not carry their own
    pub fn default_ttl(&self) -> Option<Duration> {
        self.inner.default_ttl
    }

    /// Switch the connection to another database.
    ///
    /// Tracked keys are kept, so keys written to the previous database stay
    /// in the manifest.
    pub fn select_database(&self, database: i64) -> &Self {
        self.inner.database.store(database, Ordering::SeqCst);
        self.dispatch(move |store| async move {
            match store.select(database).await {
                Ok(()) => {
                    debug!(database = database, "cache client selected database");
                    Ok(())
                }
                Err(err) => {
                    error!(database = database, error = %err, "cache client failed to select database");
                    Err(err)
                }
            }
        });
        self
    }

    /// Write `value` verbatim with the default TTL
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        let ttl = self.inner.default_ttl;
        self.set_with_ttl(key, value, ttl)
    }

    /// Write `value` verbatim; `ttl` of `None` or zero never expires
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<Duration>,
    ) -> &Self {
        let key = key.into();
        let value = value.into();
        self.inner.tracker.track(&key);
        self.dispatch(move |store| write(store, key, value, normalize_ttl(ttl)));
        self
    }

    /// Serialize `value` as JSON and write it with the default TTL
    pub fn set_json<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&Self, CacheError> {
        let json = serde_json::to_string(value)?;
        Ok(self.set(key, json))
    }

    /// Like [`set_with_ttl`](Self::set_with_ttl) but waits for the store
    pub async fn try_set_with_ttl(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let key = key.into();
        let value = value.into();
        self.inner.tracker.track(&key);
        self.request(move |store| write(store, key, value, normalize_ttl(ttl)))
            .await
    }

    /// Like [`set`](Self::set) but waits for the store
    pub async fn try_set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), CacheError> {
        let ttl = self.inner.default_ttl;
        self.try_set_with_ttl(key, value, ttl).await
    }

    /// Fetch a value.
    ///
    /// Misses and fetch failures both yield `None`; failures are logged.
    /// JSON objects and arrays come back parsed, everything else as text.
    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        match self.fetch(key).await {
            Ok(Some(raw)) => Some(CachedValue::from_stored(key, raw)),
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "cache fetch failed");
                None
            }
        }
    }

    /// Fetch and deserialize a JSON value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.fetch(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        self.request(move |store| async move { store.get(&key).await })
            .await
    }

    /// Set an expiration on an existing key; a missing key is ignored.
    ///
    /// As with EXPIRE, a zero TTL removes the key.
    pub fn expire(&self, key: impl Into<String>, ttl: Duration) -> &Self {
        let key = key.into();
        self.dispatch(move |store| async move {
            store.expire(&key, ttl_seconds(ttl)).await.map(|_| ())
        });
        self
    }

    /// Set an expiration and report whether the key existed
    pub async fn try_expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let key = key.to_string();
        self.request(move |store| async move { store.expire(&key, ttl_seconds(ttl)).await })
            .await
    }

    /// Remaining lifetime of a key
    pub async fn time_to_live(&self, key: &str) -> Result<KeyTtl, CacheError> {
        let key = key.to_string();
        self.request(move |store| async move { store.ttl(&key).await })
            .await
    }

    /// Number of keys in the selected database, tracked or not
    pub async fn count(&self) -> Result<u64, CacheError> {
        self.request(|store| async move { store.db_size().await })
            .await
    }

    /// Alias for [`count`](Self::count)
    pub async fn num_keys(&self) -> Result<u64, CacheError> {
        self.count().await
    }

    /// Sorted snapshot of the keys this client has written
    pub fn cached_keys(&self) -> Vec<String> {
        self.inner.tracker.snapshot()
    }

    /// Add a key to the manifest without writing it
    pub fn track_key(&self, key: &str) -> &Self {
        self.inner.tracker.track(key);
        self
    }

    /// Drop a key from the manifest without deleting it
    pub fn untrack_key(&self, key: &str) -> &Self {
        self.inner.tracker.untrack(key);
        self
    }

    /// Delete keys from the store and the manifest
    pub fn delete_keys<I, K>(&self, keys: I) -> &Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return self;
        }

        self.inner.tracker.untrack_all(&keys);
        self.dispatch(move |store| async move { store.del(&keys).await.map(|_| ()) });
        self
    }

    /// Delete keys and report how many existed in the store
    pub async fn try_delete_keys<I, K>(&self, keys: I) -> Result<u64, CacheError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Ok(0);
        }

        self.inner.tracker.untrack_all(&keys);
        self.request(move |store| async move { store.del(&keys).await })
            .await
    }

    /// Delete every key this client has written
    pub fn flush_tracked(&self) -> &Self {
        self.delete_keys(self.inner.tracker.snapshot())
    }

    /// Delete every key in the selected database, tracked or not
    pub fn flush_all_in_database(&self) -> &Self {
        let tracker = self.inner.tracker.clone();
        self.dispatch(move |store| async move {
            let keys = store.keys("*").await?;
            tracker.untrack_all(&keys);
            store.del(&keys).await.map(|_| ())
        });
        self
    }

    /// Atomically delete keys matching a glob pattern such as `session:*`.
    ///
    /// The manifest is not updated; matching keys it lists become stale.
    pub async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let pattern = pattern.to_string();
        self.request(move |store| async move { store.delete_matching(&pattern).await })
            .await
    }

    /// Ping the store
    pub async fn ping(&self) -> Result<String, CacheError> {
        self.request(|store| async move { store.ping().await })
            .await
    }

    /// Wait for every command submitted so far and collect the failures of
    /// fluent operations since the previous call
    pub async fn wait_pending(&self) -> Vec<CacheError> {
        let (done, finished) = oneshot::channel();
        let barrier = job(move |_| async move {
            let _ = done.send(());
        });

        let reached = self.inner.jobs.send(barrier).is_ok() && finished.await.is_ok();
        if !reached {
            self.record_failure(CacheError::WorkerStopped);
        }

        match self.inner.failures.lock() {
            Ok(mut failures) => std::mem::take(&mut *failures),
            Err(_) => vec![CacheError::General("failure log lock poisoned".to_string())],
        }
    }

    /// Queue a command whose result nobody waits for
    fn dispatch<F, Fut>(&self, op: F)
    where
        F: FnOnce(Arc<dyn KeyValueStore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        let failures = Arc::clone(&self.inner.failures);
        let command = job(move |store| async move {
            if let Err(err) = guarded(async move { op(store).await }).await {
                warn!(error = %err, "cache command failed");
                if let Ok(mut failures) = failures.lock() {
                    failures.push(err);
                }
            }
        });

        if self.inner.jobs.send(command).is_err() {
            warn!("cache worker stopped, command dropped");
            self.record_failure(CacheError::WorkerStopped);
        }
    }

    /// Queue a command and wait for its result
    async fn request<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn KeyValueStore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let command = job(move |store| async move {
            let _ = reply.send(guarded(async move { op(store).await }).await);
        });

        self.inner
            .jobs
            .send(command)
            .map_err(|_| CacheError::WorkerStopped)?;
        response.await.map_err(|_| CacheError::WorkerStopped)?
    }

    fn record_failure(&self, err: CacheError) {
        if let Ok(mut failures) = self.inner.failures.lock() {
            failures.push(err);
        }
    }
}

fn job<F, Fut>(op: F) -> Job
where
    F: FnOnce(Arc<dyn KeyValueStore>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |store| op(store).boxed())
}

/// Run a store command, turning a panic into an error so the worker survives
async fn guarded<T, Fut>(command: Fut) -> Result<T, CacheError>
where
    Fut: Future<Output = Result<T, CacheError>>,
{
    match AssertUnwindSafe(command).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!("cache command panicked");
            Err(CacheError::CommandPanicked)
        }
    }
}

/// SET followed by EXPIRE when a TTL applies
async fn write(
    store: Arc<dyn KeyValueStore>,
    key: String,
    value: String,
    ttl: Option<Duration>,
) -> Result<(), CacheError> {
    store.set(&key, &value).await?;
    if let Some(ttl) = ttl {
        store.expire(&key, ttl_seconds(ttl)).await?;
    }
    Ok(())
}

/// Runs queued commands one at a time until every client handle is dropped
async fn run_worker(store: Arc<dyn KeyValueStore>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(command) = jobs.recv().await {
        command(Arc::clone(&store)).await;
    }
    debug!("cache client worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use serde_json::json;

    fn client_with(options: CacheOptions) -> (CacheClient, InMemoryStore) {
        let data = InMemoryStore::new();
        let client = CacheClient::new(Arc::new(data.connect()), options).unwrap();
        (client, data)
    }

    #[tokio::test]
    async fn test_construction_selects_database() {
        let (client, data) = client_with(CacheOptions::default().with_database(4));
        client.set("k", "v");
        assert!(client.wait_pending().await.is_empty());

        data.select(4).await.unwrap();
        assert_eq!(data.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(client.database(), 4);
    }

    #[tokio::test]
    async fn test_set_tracks_before_returning() {
        let (client, _data) = client_with(CacheOptions::default());
        client.set("a", "1").set("b", "2").set("a", "3");

        assert_eq!(client.cached_keys(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_get_after_set_sees_the_write() {
        let (client, _data) = client_with(CacheOptions::default());
        client.set("user:1", json!({"id": 1}).to_string());

        assert_eq!(
            client.get("user:1").await,
            Some(CachedValue::Json(json!({"id": 1})))
        );
    }

    #[tokio::test]
    async fn test_failed_selection_is_collected_not_raised() {
        let (client, _data) = client_with(CacheOptions::default().with_database(-1));

        let failures = client.wait_pending().await;
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], CacheError::InvalidDatabase(-1)));

        // Still usable afterwards
        client.set("k", "v");
        assert_eq!(client.get("k").await, Some(CachedValue::Text("v".to_string())));
        assert!(client.wait_pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_keys_with_empty_input_is_noop() {
        let (client, _data) = client_with(CacheOptions::default());
        client.set("k", "v").delete_keys(Vec::<String>::new());

        assert_eq!(client.cached_keys(), vec!["k"]);
        assert_eq!(client.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_track_and_untrack() {
        let (client, _data) = client_with(CacheOptions::default());
        client.track_key("external").track_key("other").untrack_key("other");

        assert_eq!(client.cached_keys(), vec!["external"]);
    }

    #[tokio::test]
    async fn test_debug_output() {
        let (client, _data) = client_with(CacheOptions::default().with_database(2));
        client.set("k", "v");

        let debug = format!("{:?}", client);
        assert!(debug.contains("database: 2"));
        assert!(debug.contains("tracked_keys: 1"));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_collected_and_worker_survives() {
        let (client, _data) = client_with(CacheOptions::default());
        client
            .set_with_ttl("huge", "v", Some(Duration::from_secs(u64::MAX / 2)))
            .set_with_ttl("max", "v", Some(Duration::MAX))
            .set("after", "v");

        let failures = client.wait_pending().await;
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .all(|err| matches!(err, CacheError::TtlOutOfRange(_))));

        assert_eq!(
            client.get("after").await,
            Some(CachedValue::Text("v".to_string()))
        );
        assert_eq!(client.count().await.unwrap(), 3);
        assert!(matches!(
            client
                .try_expire("after", Duration::from_secs(u64::MAX))
                .await,
            Err(CacheError::TtlOutOfRange(_))
        ));
    }

    #[test]
    fn test_new_outside_runtime_is_an_error() {
        let result = CacheClient::new(Arc::new(InMemoryStore::new()), CacheOptions::default());
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }

    #[test]
    fn test_wait_pending_reports_stopped_worker() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let client = runtime
            .block_on(async {
                CacheClient::new(Arc::new(InMemoryStore::new()), CacheOptions::default())
            })
            .unwrap();
        // Dropping the runtime drops the worker task with it
        drop(runtime);

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let failures = runtime.block_on(client.wait_pending());
        assert!(failures
            .iter()
            .any(|err| matches!(err, CacheError::WorkerStopped)));
        assert!(matches!(
            runtime.block_on(client.count()),
            Err(CacheError::WorkerStopped)
        ));
    }
}

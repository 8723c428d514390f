//! Session store backed by a document database.
//!
//! Each session lives in its own JSON document at
//! `prefix + session_id + ".json"`. Every write and touch stamps the
//! document's `_mlttl` field with an absolute expiry, and a background
//! sweep removes documents whose stamp has passed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{
    ClientError, DocumentWrite, ErrorLogger, Patch, Query, SharedClient, default_error_logger,
};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::serializer::{JsonSerializer, SharedSerializer};
use crate::session::{Session, StoredSession, TTL_FIELD};
use crate::sweep::{SweepHandle, spawn_sweep_task};
use crate::ttl;
use crate::uri;

// ─────────────────────────────────────────────────────────────────────────────
// Store Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Asynchronous session store contract used by web session middleware.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session. `Ok(None)` when it does not exist.
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Create or replace a session.
    async fn set(&self, session_id: &str, session: &Session) -> Result<()>;

    /// Delete a session.
    async fn destroy(&self, session_id: &str) -> Result<()>;

    /// Refresh a session's expiry without rewriting its payload.
    async fn touch(&self, session_id: &str, session: &Session) -> Result<()>;

    /// Every stored session.
    async fn all(&self) -> Result<Vec<StoredSession>>;

    /// Number of stored sessions.
    async fn length(&self) -> Result<usize>;

    /// Delete every session.
    async fn clear(&self) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

/// State shared between the store and its sweep task.
pub(crate) struct StoreInner {
    client: SharedClient,
    prefix: String,
    ttl: Option<u64>,
    serializer: SharedSerializer,
    logger: Option<ErrorLogger>,
}

impl StoreInner {
    fn document_uri(&self, session_id: &str) -> String {
        uri::document_uri(&self.prefix, session_id)
    }

    fn directory_query(&self) -> Query {
        Query::directory(self.prefix.clone(), true)
    }

    /// Remove every session document whose expiry lies in the past.
    pub(crate) async fn prune_sessions(&self) -> Result<usize> {
        let now = ttl::now_millis();
        debug!(prefix = %self.prefix, now = now, "PRUNING");

        let query = self
            .directory_query()
            .and(Query::field_less_than(TTL_FIELD, now as f64));
        let expired: Vec<String> = self
            .observe(self.client.query(&query).await)?
            .into_iter()
            .map(|doc| doc.uri)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        debug!(uris = ?expired, "Removing expired sessions");
        self.observe(self.client.remove(&expired).await)?;
        info!(
            prefix = %self.prefix,
            removed = expired.len(),
            "Expired sessions pruned"
        );
        Ok(expired.len())
    }

    /// Pass client failures to the configured error logger.
    fn observe<T>(&self, result: std::result::Result<T, ClientError>) -> Result<T> {
        if let (Err(err), Some(logger)) = (&result, &self.logger) {
            (logger.as_ref())(err);
        }
        Ok(result?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`DocumentSessionStore`].
pub struct StoreBuilder {
    client: SharedClient,
    config: StoreConfig,
    serializer: SharedSerializer,
    logger: Option<ErrorLogger>,
}

impl StoreBuilder {
    /// Start a builder around a document store client.
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            config: StoreConfig::default(),
            serializer: Arc::new(JsonSerializer),
            logger: None,
        }
    }

    /// Use the given configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom session codec.
    pub fn serializer(mut self, serializer: SharedSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Report client errors to a custom callback.
    pub fn error_logger(mut self, logger: ErrorLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the store and start the expiry sweep if enabled.
    ///
    /// The first sweep runs once the caller yields to the runtime.
    /// Fails with [`Error::NoRuntime`] when a sweep is requested outside a
    /// tokio runtime.
    pub fn build(self) -> Result<DocumentSessionStore> {
        let logger = match self.logger {
            Some(logger) => Some(logger),
            None if self.config.log_errors => Some(default_error_logger()),
            None => None,
        };
        let inner = Arc::new(StoreInner {
            client: self.client,
            prefix: self.config.prefix.clone(),
            ttl: self.config.ttl(),
            serializer: self.serializer,
            logger,
        });

        let sweeper = if self.config.sweep {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
            Some(spawn_sweep_task(
                &runtime,
                Arc::clone(&inner),
                self.config.prune_interval(),
            ))
        } else {
            None
        };

        debug!(
            prefix = %inner.prefix,
            ttl_secs = ?inner.ttl,
            sweep = sweeper.is_some(),
            "Document session store created"
        );

        Ok(DocumentSessionStore {
            inner,
            config: self.config,
            sweeper,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Session Store
// ─────────────────────────────────────────────────────────────────────────────

/// [`SessionStore`] persisting sessions as documents.
///
/// Holds no session state of its own; the document store owns every
/// record. Dropping the store stops its sweep task.
pub struct DocumentSessionStore {
    inner: Arc<StoreInner>,
    config: StoreConfig,
    sweeper: Option<SweepHandle>,
}

impl DocumentSessionStore {
    /// Create a store with default settings.
    pub fn new(client: SharedClient) -> Result<Self> {
        StoreBuilder::new(client).build()
    }

    /// Start a builder.
    pub fn builder(client: SharedClient) -> StoreBuilder {
        StoreBuilder::new(client)
    }

    /// Namespace of this store's document URIs.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Configured fixed lifetime in seconds, if any.
    pub fn ttl(&self) -> Option<u64> {
        self.inner.ttl
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Document URI for a session id.
    pub fn document_uri(&self, session_id: &str) -> String {
        self.inner.document_uri(session_id)
    }

    /// Absolute expiry this store would stamp on `session` now.
    pub fn expires_at(&self, session: &Session) -> i64 {
        ttl::expires_at(self.inner.ttl, session)
    }

    /// Whether the background sweep is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Run one expiry sweep, returning the number of sessions removed.
    pub async fn prune_sessions(&self) -> Result<usize> {
        self.inner.prune_sessions().await
    }

    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
    }
}

impl Drop for DocumentSessionStore {
    fn drop(&mut self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.cancel();
        }
    }
}

impl std::fmt::Debug for DocumentSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSessionStore")
            .field("prefix", &self.inner.prefix)
            .field("ttl", &self.inner.ttl)
            .field("sweeping", &self.is_sweeping())
            .finish()
    }
}

#[async_trait]
impl SessionStore for DocumentSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let uri = self.inner.document_uri(session_id);
        debug!(session_id = %session_id, uri = %uri, "GET");

        let documents = self.inner.observe(self.inner.client.read(&uri).await)?;
        match documents.into_iter().next() {
            Some(doc) => Ok(Some(self.inner.serializer.decode(doc.content)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, session_id: &str, session: &Session) -> Result<()> {
        let uri = self.inner.document_uri(session_id);
        let expires_at = ttl::expires_at(self.inner.ttl, session);
        let mut stamped = session.clone();
        stamped.strip_reserved();
        stamped.expires_at = Some(expires_at);
        debug!(uri = %uri, ttl = expires_at, "SET");

        let mut content = self.inner.serializer.encode(&stamped)?;
        // The stamp is written last so nothing in the payload can shadow it.
        if let Value::Object(map) = &mut content {
            map.insert(TTL_FIELD.to_string(), Value::from(expires_at));
        }
        let written = self
            .inner
            .client
            .write(DocumentWrite::json(uri, content))
            .await;
        self.inner.observe(written)?;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        let uri = self.inner.document_uri(session_id);
        debug!(uri = %uri, "DEL");
        self.inner.observe(self.inner.client.remove(&[uri]).await)?;
        Ok(())
    }

    async fn touch(&self, session_id: &str, session: &Session) -> Result<()> {
        let uri = self.inner.document_uri(session_id);
        let expires_at = ttl::expires_at(self.inner.ttl, session);
        debug!(uri = %uri, ttl = expires_at, "EXPIRE");

        let patch = Patch::new().replace(format!("/{TTL_FIELD}"), expires_at);
        self.inner.observe(self.inner.client.patch(&uri, patch).await)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<StoredSession>> {
        let documents = self
            .inner
            .observe(self.inner.client.query(&self.inner.directory_query()).await)?;
        debug!(prefix = %self.inner.prefix, count = documents.len(), "ALL");

        let sessions = documents
            .into_iter()
            .filter_map(|doc| {
                let session = match self.inner.serializer.decode(doc.content) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!(uri = %doc.uri, error = %e, "Skipping unreadable session document");
                        return None;
                    }
                };
                let id = uri::session_id_from_uri(&self.inner.prefix, &doc.uri)
                    .unwrap_or(doc.uri.as_str())
                    .to_string();
                Some(StoredSession {
                    id,
                    uri: doc.uri,
                    session,
                })
            })
            .collect();
        Ok(sessions)
    }

    async fn length(&self) -> Result<usize> {
        let documents = self
            .inner
            .observe(self.inner.client.query(&self.inner.directory_query()).await)?;
        debug!(prefix = %self.inner.prefix, count = documents.len(), "LENGTH");
        Ok(documents.len())
    }

    async fn clear(&self) -> Result<()> {
        debug!(prefix = %self.inner.prefix, "CLEAR all docs");
        self.inner
            .observe(self.inner.client.remove_all(&self.inner.prefix).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentClient;
    use serde_json::json;
    use std::time::Duration;

    fn test_store() -> (DocumentSessionStore, Arc<MemoryDocumentClient>) {
        let client = Arc::new(MemoryDocumentClient::new());
        let store = DocumentSessionStore::builder(client.clone())
            .config(StoreConfig::new().with_sweep(false))
            .build()
            .unwrap();
        (store, client)
    }

    #[tokio::test]
    async fn test_set_writes_stamped_document() {
        let (store, client) = test_store();
        let session = Session::new()
            .with_max_age(Duration::from_secs(60))
            .with_field("user", "bob");

        let before = ttl::now_millis();
        store.set("abc", &session).await.unwrap();

        let raw = client.get_raw("/sess/abc.json").unwrap();
        assert_eq!(raw["user"], json!("bob"));
        let stamp = raw[TTL_FIELD].as_i64().unwrap();
        assert!(stamp >= before + 60_000);
        assert!(stamp <= ttl::now_millis() + 60_000);
    }

    #[tokio::test]
    async fn test_set_does_not_mutate_input() {
        let (store, _client) = test_store();
        let session = Session::new();
        store.set("abc", &session).await.unwrap();
        assert_eq!(session.expires_at, None);
    }

    #[tokio::test]
    async fn test_payload_cannot_shadow_expiry() {
        let (store, client) = test_store();
        let mut session = Session::new().with_field(TTL_FIELD, "never");
        session.data.insert(TTL_FIELD.to_string(), json!("never"));
        session.data.insert("cookie".to_string(), json!("broken"));
        session.data.insert("user".to_string(), json!("eve"));

        store.set("a", &session).await.unwrap();

        let raw = client.get_raw("/sess/a.json").unwrap();
        assert!(raw[TTL_FIELD].is_i64());
        assert!(raw["cookie"].is_object());
        assert_eq!(raw["user"], json!("eve"));

        let stored = store.get("a").await.unwrap().unwrap();
        assert!(stored.expires_at.is_some());
        assert_eq!(stored.get("user"), Some(&json!("eve")));
    }

    #[tokio::test]
    async fn test_all_skips_unreadable_documents() {
        let (store, client) = test_store();
        store.set("good", &Session::new()).await.unwrap();
        client.insert_raw("/sess/nested/meta.json", json!({ "_mlttl": 1.5e12 }));
        client.insert_raw("/sess/broken.json", json!([1, 2, 3]));

        let sessions = store.all().await.unwrap();
        let mut ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["good", "nested/meta"]);
        assert_eq!(store.length().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, _client) = test_store();
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_replaces_only_ttl() {
        let (store, client) = test_store();
        client.insert_raw("/sess/t.json", json!({ "_mlttl": 1, "cart": [3] }));

        let session = Session::new().with_field("cart", json!(["ignored"]));
        store.touch("t", &session).await.unwrap();

        let raw = client.get_raw("/sess/t.json").unwrap();
        assert_eq!(raw["cart"], json!([3]));
        assert!(raw[TTL_FIELD].as_i64().unwrap() > 1);
    }

    #[tokio::test]
    async fn test_touch_reports_patch_failure() {
        let (store, _client) = test_store();
        let result = store.touch("missing", &Session::new()).await;
        assert!(matches!(
            result,
            Err(Error::Client(ClientError::Patch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_configured_ttl_applies() {
        let client = Arc::new(MemoryDocumentClient::new());
        let store = DocumentSessionStore::builder(client.clone())
            .config(
                StoreConfig::new()
                    .with_sweep(false)
                    .with_ttl(Duration::from_secs(10)),
            )
            .build()
            .unwrap();
        assert_eq!(store.ttl(), Some(10));

        let session = Session::new().with_max_age(Duration::from_secs(3600));
        let before = ttl::now_millis();
        store.set("x", &session).await.unwrap();

        let stamp = client.get_raw("/sess/x.json").unwrap()[TTL_FIELD]
            .as_i64()
            .unwrap();
        assert!(stamp >= before + 10_000);
        assert!(stamp < before + 3_600_000);
    }

    #[tokio::test]
    async fn test_prune_scoped_to_prefix() {
        let (store, client) = test_store();
        client.insert_raw("/sess/old.json", json!({ "_mlttl": 1 }));
        client.insert_raw("/elsewhere/old.json", json!({ "_mlttl": 1 }));

        assert_eq!(store.prune_sessions().await.unwrap(), 1);
        assert_eq!(client.uris(), vec!["/elsewhere/old.json".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_nothing_expired() {
        let (store, client) = test_store();
        store.set("fresh", &Session::new()).await.unwrap();
        assert_eq!(store.prune_sessions().await.unwrap(), 0);
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_surface_unchanged() {
        let (store, client) = test_store();
        client.fail_with("disk full");

        let err = store.set("a", &Session::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to write document '/sess/a.json': disk full"
        );
        assert!(matches!(
            store.get("a").await,
            Err(Error::Client(ClientError::Read { .. }))
        ));
        assert!(matches!(
            store.destroy("a").await,
            Err(Error::Client(ClientError::Remove { .. }))
        ));
        assert!(matches!(
            store.all().await,
            Err(Error::Client(ClientError::Query { .. }))
        ));
        assert!(matches!(
            store.length().await,
            Err(Error::Client(ClientError::Query { .. }))
        ));
        assert!(matches!(
            store.clear().await,
            Err(Error::Client(ClientError::Remove { .. }))
        ));
        assert!(matches!(
            store.prune_sessions().await,
            Err(Error::Client(ClientError::Query { .. }))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_codec_error() {
        let (store, client) = test_store();
        client.insert_raw("/sess/bad.json", json!([1, 2, 3]));
        assert!(matches!(store.get("bad").await, Err(Error::Codec(_))));
    }

    #[tokio::test]
    async fn test_error_logger_sees_operation_failures() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let client = Arc::new(MemoryDocumentClient::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let store = DocumentSessionStore::builder(client.clone())
            .config(StoreConfig::new().with_sweep(false))
            .error_logger(Arc::new(move |_err: &ClientError| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        store.set("a", &Session::new()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        client.fail_with("offline");
        assert!(store.get("a").await.is_err());
        assert!(store.touch("a", &Session::new()).await.is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_log_errors_installs_default_logger() {
        let client = Arc::new(MemoryDocumentClient::new());
        let store = DocumentSessionStore::builder(client.clone())
            .config(StoreConfig::new().with_sweep(false).with_log_errors(true))
            .build()
            .unwrap();
        assert!(store.inner.logger.is_some());

        client.fail_with("offline");
        assert!(store.length().await.is_err());
    }

    #[test]
    fn test_build_without_runtime() {
        let client = Arc::new(MemoryDocumentClient::new());
        let result = DocumentSessionStore::new(client);
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[test]
    fn test_build_without_sweep_needs_no_runtime() {
        let client = Arc::new(MemoryDocumentClient::new());
        let store = DocumentSessionStore::builder(client)
            .config(StoreConfig::new().with_sweep(false).with_prefix("/p/"))
            .build()
            .unwrap();
        assert!(!store.is_sweeping());
        assert_eq!(store.prefix(), "/p/");
        assert_eq!(store.document_uri("id"), "/p/id.json");
    }
}

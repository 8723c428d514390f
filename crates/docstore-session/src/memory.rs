//! In-process document store.
//!
//! [`MemoryDocumentClient`] keeps documents in a sorted map and evaluates
//! [`Query`] expressions directly. It backs the test suite and suits
//! single-process deployments that do not need a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use crate::client::{
    ClientError, Document, DocumentClient, DocumentWrite, Patch, PatchOp, Query,
};

/// In-memory [`DocumentClient`].
#[derive(Default)]
pub struct MemoryDocumentClient {
    documents: RwLock<BTreeMap<String, Value>>,
    failing: RwLock<Option<String>>,
}

impl MemoryDocumentClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following operation fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.write() = Some(message.into());
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        *self.failing.write() = None;
    }

    /// Insert a document without going through the client interface.
    pub fn insert_raw(&self, uri: impl Into<String>, content: Value) {
        self.documents.write().insert(uri.into(), content);
    }

    /// Peek at a stored document.
    pub fn get_raw(&self, uri: &str) -> Option<Value> {
        self.documents.read().get(uri).cloned()
    }

    /// All stored URIs in order.
    pub fn uris(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Return the injected failure, if any.
    fn check(&self, make: impl FnOnce(String) -> ClientError) -> Result<(), ClientError> {
        match self.failing.read().clone() {
            Some(message) => Err(make(message)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MemoryDocumentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocumentClient")
            .field("documents", &self.documents.read().len())
            .field("failing", &self.failing.read().is_some())
            .finish()
    }
}

fn apply_op(content: &mut Value, op: PatchOp) -> Result<(), String> {
    match op {
        PatchOp::Replace { path, value } => {
            if let Some(target) = content.pointer_mut(&path) {
                *target = value;
                return Ok(());
            }
            // A missing top-level field is created.
            let key = path
                .strip_prefix('/')
                .filter(|key| !key.contains('/'))
                .ok_or_else(|| format!("path '{path}' not found"))?;
            match content.as_object_mut() {
                Some(map) => {
                    map.insert(key.to_string(), value);
                    Ok(())
                }
                None => Err(format!("path '{path}' not found")),
            }
        }
    }
}

#[async_trait]
impl DocumentClient for MemoryDocumentClient {
    async fn read(&self, uri: &str) -> Result<Vec<Document>, ClientError> {
        self.check(|message| ClientError::Read {
            uri: uri.to_string(),
            message,
        })?;
        trace!(uri = %uri, "memory read");
        Ok(self
            .documents
            .read()
            .get(uri)
            .map(|content| vec![Document::new(uri, content.clone())])
            .unwrap_or_default())
    }

    async fn write(&self, write: DocumentWrite) -> Result<(), ClientError> {
        self.check(|message| ClientError::Write {
            uri: write.uri.clone(),
            message,
        })?;
        trace!(uri = %write.uri, content_type = %write.content_type, "memory write");
        self.documents.write().insert(write.uri, write.content);
        Ok(())
    }

    async fn remove(&self, uris: &[String]) -> Result<(), ClientError> {
        self.check(|message| ClientError::Remove { message })?;
        let mut documents = self.documents.write();
        for uri in uris {
            documents.remove(uri);
        }
        trace!(count = uris.len(), "memory remove");
        Ok(())
    }

    async fn remove_all(&self, directory: &str) -> Result<(), ClientError> {
        self.check(|message| ClientError::Remove { message })?;
        self.documents
            .write()
            .retain(|uri, _| !uri.starts_with(directory));
        trace!(directory = %directory, "memory remove_all");
        Ok(())
    }

    async fn patch(&self, uri: &str, patch: Patch) -> Result<(), ClientError> {
        self.check(|message| ClientError::Patch {
            uri: uri.to_string(),
            message,
        })?;
        let mut documents = self.documents.write();
        let Some(content) = documents.get_mut(uri) else {
            return Err(ClientError::Patch {
                uri: uri.to_string(),
                message: "document not found".to_string(),
            });
        };

        // Apply to a copy so a failing op leaves the document untouched.
        let mut updated = content.clone();
        for op in patch.ops {
            apply_op(&mut updated, op).map_err(|message| ClientError::Patch {
                uri: uri.to_string(),
                message,
            })?;
        }
        *content = updated;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, ClientError> {
        self.check(|message| ClientError::Query { message })?;
        let results: Vec<Document> = self
            .documents
            .read()
            .iter()
            .filter(|(uri, content)| query.matches(uri, content))
            .map(|(uri, content)| Document::new(uri.clone(), content.clone()))
            .collect();
        trace!(query = %query, matched = results.len(), "memory query");
        Ok(results)
    }
}

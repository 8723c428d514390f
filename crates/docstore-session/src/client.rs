//! Document store client abstraction.
//!
//! The session store never talks to a database directly. It drives a
//! [`DocumentClient`], which reads, writes, patches, removes and queries
//! JSON documents addressed by URI. [`crate::MemoryDocumentClient`] is an
//! in-process implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error reported by a document store client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Reading a document failed.
    #[error("failed to read document '{uri}': {message}")]
    Read { uri: String, message: String },

    /// Writing a document failed.
    #[error("failed to write document '{uri}': {message}")]
    Write { uri: String, message: String },

    /// Removing one or more documents failed.
    #[error("failed to remove documents: {message}")]
    Remove { message: String },

    /// Patching a document failed.
    #[error("failed to patch document '{uri}': {message}")]
    Patch { uri: String, message: String },

    /// Running a query failed.
    #[error("query failed: {message}")]
    Query { message: String },
}

/// Callback receiving document store errors.
pub type ErrorLogger = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Logger installed when error logging is enabled without a custom callback.
pub fn default_error_logger() -> ErrorLogger {
    Arc::new(|err: &ClientError| {
        tracing::warn!(error = %err, "Document store reported a client error");
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Content type of every session document.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A document returned by a read or query.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document URI.
    pub uri: String,

    /// Document body.
    pub content: Value,
}

impl Document {
    /// Create a new document.
    pub fn new(uri: impl Into<String>, content: Value) -> Self {
        Self {
            uri: uri.into(),
            content,
        }
    }
}

/// A create-or-replace write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    /// Document URI.
    pub uri: String,

    /// MIME type of the content.
    pub content_type: String,

    /// Document body.
    pub content: Value,
}

impl DocumentWrite {
    /// Create a JSON document write.
    pub fn json(uri: impl Into<String>, content: Value) -> Self {
        Self {
            uri: uri.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            content,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Partial updates
// ─────────────────────────────────────────────────────────────────────────────

/// A single partial-update operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Replace the value at a JSON pointer path.
    Replace { path: String, value: Value },
}

/// A partial update applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Operations applied in order.
    pub ops: Vec<PatchOp>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replace operation.
    pub fn replace(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(PatchOp::Replace {
            path: path.into(),
            value: value.into(),
        });
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

/// Query over document URIs and content.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Documents whose URI lies in `path`. With `recursive`, nested
    /// directories are included.
    Directory { path: String, recursive: bool },

    /// Documents whose numeric top-level `field` is below `value`.
    FieldLessThan { field: String, value: f64 },

    /// Documents matching every sub-query.
    And(Vec<Query>),
}

impl Query {
    /// All documents under a directory.
    pub fn directory(path: impl Into<String>, recursive: bool) -> Self {
        Query::Directory {
            path: path.into(),
            recursive,
        }
    }

    /// Documents whose numeric `field` is below `value`.
    pub fn field_less_than(field: impl Into<String>, value: impl Into<f64>) -> Self {
        Query::FieldLessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Combine with another query; both must match.
    pub fn and(self, other: Query) -> Self {
        match self {
            Query::And(mut queries) => {
                queries.push(other);
                Query::And(queries)
            }
            query => Query::And(vec![query, other]),
        }
    }

    /// Evaluate the query against one document.
    pub fn matches(&self, uri: &str, content: &Value) -> bool {
        match self {
            Query::Directory { path, recursive } => match uri.strip_prefix(path.as_str()) {
                Some(rest) => *recursive || !rest.contains('/'),
                None => false,
            },
            Query::FieldLessThan { field, value } => content
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v < *value),
            Query::And(queries) => queries.iter().all(|q| q.matches(uri, content)),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Directory { path, recursive } => {
                write!(f, "directory({path}, recursive={recursive})")
            }
            Query::FieldLessThan { field, value } => write!(f, "{field} < {value}"),
            Query::And(queries) => {
                let parts: Vec<String> = queries.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" AND "))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for document store clients.
///
/// Every method resolves once the store has acknowledged the operation.
/// Errors are returned unchanged to the session store's callers and passed
/// to the store's [`ErrorLogger`] when one is configured.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Read the document at `uri`. An empty vector means it does not exist.
    async fn read(&self, uri: &str) -> Result<Vec<Document>, ClientError>;

    /// Create or replace a document.
    async fn write(&self, write: DocumentWrite) -> Result<(), ClientError>;

    /// Remove every listed document. Missing URIs are not an error.
    async fn remove(&self, uris: &[String]) -> Result<(), ClientError>;

    /// Remove every document under `directory`.
    async fn remove_all(&self, directory: &str) -> Result<(), ClientError>;

    /// Apply a partial update to an existing document.
    async fn patch(&self, uri: &str, patch: Patch) -> Result<(), ClientError>;

    /// Run a query and return the matching documents.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, ClientError>;
}

/// Type alias for a shared client reference.
pub type SharedClient = Arc<dyn DocumentClient>;

//! Web session store persisted as JSON documents.
//!
//! This crate maps the session lifecycle onto a document database:
//! - One document per session at `prefix + session_id + ".json"`
//! - An absolute `_mlttl` expiry stamped on every write and touch
//! - A background sweep removing documents whose expiry has passed
//!
//! The database itself sits behind the [`DocumentClient`] trait.
//! [`MemoryDocumentClient`] is an in-process implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use docstore_session::{
//!     DocumentSessionStore, MemoryDocumentClient, Session, SessionStore, StoreConfig,
//! };
//!
//! let client = Arc::new(MemoryDocumentClient::new());
//! let store = DocumentSessionStore::builder(client)
//!     .config(StoreConfig::default().with_ttl(Duration::from_secs(3600)))
//!     .build()?;
//!
//! store.set("sid", &Session::new().with_field("user", "alice")).await?;
//! ```

mod client;
mod config;
mod error;
mod memory;
mod serializer;
mod session;
mod store;
mod sweep;
mod ttl;
mod uri;

pub use client::{
    ClientError, Document, DocumentClient, DocumentWrite, ErrorLogger, JSON_CONTENT_TYPE, Patch,
    PatchOp, Query, SharedClient, default_error_logger,
};
pub use config::{DEFAULT_PREFIX, DEFAULT_PRUNE_INTERVAL, MIN_PRUNE_INTERVAL, StoreConfig};
pub use error::{ConfigError, Error, Result};
pub use memory::MemoryDocumentClient;
pub use serializer::{JsonSerializer, SessionSerializer, SharedSerializer};
pub use session::{
    COOKIE_FIELD, Session, SessionCookie, StoredSession, TTL_FIELD, is_reserved_field,
};
pub use store::{DocumentSessionStore, SessionStore, StoreBuilder};
pub use ttl::{ONE_DAY_SECS, expires_at, expires_at_from, now_millis, ttl_seconds};
pub use uri::{DOCUMENT_EXTENSION, document_uri, session_id_from_uri};

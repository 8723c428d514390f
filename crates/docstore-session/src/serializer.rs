//! Session payload codecs.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::session::Session;

/// Converts sessions to and from stored document content.
///
/// The codec runs on every write and after every read or query, so an
/// implementation can compress, encrypt or reshape the payload as long as
/// the `_mlttl` field stays a top-level number for the expiry sweep.
pub trait SessionSerializer: Send + Sync {
    /// Encode a session into document content.
    fn encode(&self, session: &Session) -> Result<Value>;

    /// Decode document content into a session.
    fn decode(&self, content: Value) -> Result<Session>;
}

/// Plain JSON codec; documents hold the session as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl SessionSerializer for JsonSerializer {
    fn encode(&self, session: &Session) -> Result<Value> {
        Ok(serde_json::to_value(session)?)
    }

    fn decode(&self, content: Value) -> Result<Session> {
        Ok(serde_json::from_value(content)?)
    }
}

/// Type alias for a shared serializer reference.
pub type SharedSerializer = Arc<dyn SessionSerializer>;

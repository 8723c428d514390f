//! Session record types.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Name of the document field holding the absolute expiry time.
pub const TTL_FIELD: &str = "_mlttl";

/// Name of the document field holding the cookie settings.
pub const COOKIE_FIELD: &str = "cookie";

/// Whether `key` names a field the store manages itself.
pub fn is_reserved_field(key: &str) -> bool {
    key == TTL_FIELD || key == COOKIE_FIELD
}

/// Cookie settings attached to a session by the web framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Remaining cookie lifetime in milliseconds.
    #[serde(rename = "maxAge", default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<f64>,

    /// Remaining cookie attributes (path, httpOnly, expires, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A web session as persisted in the document store.
///
/// Application fields are kept as arbitrary JSON next to the cookie and
/// the expiry stamp, so a stored document is a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Cookie settings; drives the lifetime when no fixed TTL is configured.
    #[serde(default)]
    pub cookie: SessionCookie,

    /// Absolute expiry in milliseconds since the epoch.
    /// Absent until the session is first written.
    #[serde(
        rename = "_mlttl",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_expiry"
    )]
    pub expires_at: Option<i64>,

    /// Application-defined payload.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = Some(max_age.as_millis() as f64);
        self
    }

    /// Set an application field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an application field, returning the previous value.
    ///
    /// Reserved fields (`cookie`, `_mlttl`) are left untouched and `None`
    /// is returned; use [`Session::cookie`] and the store's stamping instead.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        if is_reserved_field(&key) {
            tracing::warn!(key = %key, "Ignoring reserved session field");
            return None;
        }
        self.data.insert(key, value.into())
    }

    /// Drop reserved keys that were placed directly into [`Session::data`].
    pub(crate) fn strip_reserved(&mut self) {
        self.data.retain(|key, _| !is_reserved_field(key));
    }

    /// Get an application field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Remove an application field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Whether the expiry stamp lies before `now_ms`.
    /// Sessions never written are not considered expired.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|ttl| ttl < now_ms)
    }
}

/// Accept the expiry as any JSON number. Stores that keep numbers as
/// doubles hand back `1.7e12` rather than an integer.
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Int(i64),
        Float(f64),
    }

    match Option::<Stamp>::deserialize(deserializer)? {
        Some(Stamp::Int(ms)) => Ok(Some(ms)),
        Some(Stamp::Float(ms)) if ms.is_finite() => Ok(Some(ms.trunc() as i64)),
        Some(Stamp::Float(ms)) => Err(serde::de::Error::custom(format!(
            "expiry must be a finite number, got {ms}"
        ))),
        None => Ok(None),
    }
}

/// A session read back from the store together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    /// Session id derived from the document URI.
    pub id: String,

    /// Document URI.
    pub uri: String,

    /// Decoded session.
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_shape_is_flat() {
        let mut session = Session::new()
            .with_max_age(Duration::from_secs(120))
            .with_field("user", "alice");
        session.expires_at = Some(1_700_000_000_000);

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(
            value,
            json!({
                "cookie": { "maxAge": 120000.0 },
                "_mlttl": 1_700_000_000_000i64,
                "user": "alice"
            })
        );
    }

    #[test]
    fn test_parse_framework_document() {
        let value = json!({
            "cookie": { "maxAge": 5000, "path": "/", "httpOnly": true },
            "views": 3
        });
        let session: Session = serde_json::from_value(value).unwrap();

        assert_eq!(session.cookie.max_age, Some(5000.0));
        assert_eq!(session.cookie.extra.get("path"), Some(&json!("/")));
        assert_eq!(session.get("views"), Some(&json!(3)));
        assert_eq!(session.expires_at, None);
    }

    #[test]
    fn test_missing_cookie_defaults() {
        let session: Session = serde_json::from_value(json!({ "a": 1 })).unwrap();
        assert_eq!(session.cookie, SessionCookie::default());
    }

    #[test]
    fn test_is_expired_at() {
        let mut session = Session::new();
        assert!(!session.is_expired_at(i64::MAX));

        session.expires_at = Some(1000);
        assert!(session.is_expired_at(1001));
        assert!(!session.is_expired_at(1000));
    }

    #[test]
    fn test_float_expiry_is_accepted() {
        let session: Session =
            serde_json::from_value(json!({ "_mlttl": 1.5e12, "a": 1 })).unwrap();
        assert_eq!(session.expires_at, Some(1_500_000_000_000));

        let session: Session = serde_json::from_value(json!({ "_mlttl": null })).unwrap();
        assert_eq!(session.expires_at, None);

        assert!(serde_json::from_value::<Session>(json!({ "_mlttl": "never" })).is_err());
    }

    #[test]
    fn test_reserved_fields_are_not_inserted() {
        let mut session = Session::new().with_field(TTL_FIELD, "never");
        assert_eq!(session.insert("cookie", json!({ "maxAge": 1 })), None);
        assert!(session.data.is_empty());
        assert_eq!(session.cookie, SessionCookie::default());

        session.data.insert(TTL_FIELD.to_string(), json!("never"));
        session.data.insert("keep".to_string(), json!(1));
        session.strip_reserved();
        assert_eq!(session.data.len(), 1);
        assert_eq!(session.get("keep"), Some(&json!(1)));
    }

    #[test]
    fn test_insert_and_remove() {
        let mut session = Session::new();
        assert_eq!(session.insert("k", 1), None);
        assert_eq!(session.insert("k", 2), Some(json!(1)));
        assert_eq!(session.remove("k"), Some(json!(2)));
        assert!(session.get("k").is_none());
    }
}

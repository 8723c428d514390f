//! TTL computation for session documents.

use crate::session::Session;

/// One day in seconds; the lifetime of sessions without a cookie max age.
pub const ONE_DAY_SECS: i64 = 86_400;

/// Current time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Session lifetime in seconds.
///
/// A configured TTL wins; otherwise the cookie's max age (rounded down to
/// whole seconds) is used, falling back to one day.
pub fn ttl_seconds(configured: Option<u64>, session: &Session) -> i64 {
    match configured.filter(|secs| *secs > 0) {
        Some(secs) => i64::try_from(secs).unwrap_or(i64::MAX),
        None => match session.cookie.max_age {
            Some(max_age) if max_age.is_finite() => (max_age / 1000.0).floor() as i64,
            _ => ONE_DAY_SECS,
        },
    }
}

/// Absolute expiry for `session` relative to `now_ms`.
pub fn expires_at_from(now_ms: i64, configured: Option<u64>, session: &Session) -> i64 {
    now_ms.saturating_add(ttl_seconds(configured, session).saturating_mul(1000))
}

/// Absolute expiry for `session` relative to the current time.
pub fn expires_at(configured: Option<u64>, session: &Session) -> i64 {
    expires_at_from(now_millis(), configured, session)
}

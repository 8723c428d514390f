//! Mapping between session ids and document URIs.

/// Extension appended to every session document URI.
pub const DOCUMENT_EXTENSION: &str = ".json";

/// Document URI for a session id under `prefix`.
pub fn document_uri(prefix: &str, session_id: &str) -> String {
    format!("{prefix}{session_id}{DOCUMENT_EXTENSION}")
}

/// Recover the session id from a document URI.
///
/// Returns `None` when the URI lies outside `prefix`. A missing extension
/// leaves the remainder as-is.
pub fn session_id_from_uri<'a>(prefix: &str, uri: &'a str) -> Option<&'a str> {
    let rest = uri.strip_prefix(prefix)?;
    Some(rest.strip_suffix(DOCUMENT_EXTENSION).unwrap_or(rest))
}

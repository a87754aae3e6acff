//! ETags for lesson progress rows.
//!
//! An ETag is the SHA-256 of the row's id and its version counter, so it
//! changes on every stored write and on nothing else.

use academy_core::progress::StudentLessonProgress;
use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

/// Compute the quoted ETag for a progress row.
pub fn progress_etag(progress: &StudentLessonProgress) -> String {
  let mut hasher = Sha256::new();
  hasher.update(progress.progress_id.as_bytes());
  hasher.update(progress.version.to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// The raw `If-Match` header, if present and readable.
pub fn if_match(headers: &HeaderMap) -> Option<&str> {
  headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok())
}

/// Whether an `If-Match` value names `etag`. `*` matches any existing row.
pub fn matches(if_match: &str, etag: &str) -> bool {
  if_match
    .split(',')
    .map(str::trim)
    .any(|candidate| candidate == "*" || strip_etag_quotes(candidate) == strip_etag_quotes(etag))
}

/// `If-Match` headers may carry ETags with or without the surrounding `"`
/// characters; compare the bare value.
fn strip_etag_quotes(s: &str) -> &str { s.trim_matches('"') }

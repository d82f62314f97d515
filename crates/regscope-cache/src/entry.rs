//! Cache entries and cache keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use url::Url;

/// Longest file stem written to disk before the tail is replaced by a hash.
const MAX_STEM_LEN: usize = 160;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// A stored network response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// HTTP status code
    pub status: u16,
    /// Response headers, in received order
    pub headers: Vec<(String, String)>,
    /// Response body
    #[serde(skip)]
    pub body: Vec<u8>,
    /// When the entry stops being servable; `None` means never
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            expires_at,
        }
    }

    /// Whether the entry may still be served at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

/// Normalise a resource URL into its cache key.
///
/// The key is scheme, host, optional explicit port and path. Query string and
/// fragment are dropped so cache-busting parameters map onto one entry.
/// Returns `None` for URLs without a host (`data:`, `blob:`, ...).
#[must_use]
pub fn cache_key(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{host}{port}{}", url.scheme(), url.path()))
}

/// Deterministic, filesystem-safe file stem for a cache key.
///
/// The scheme is dropped; host and path are kept with every byte outside
/// `[A-Za-z0-9._-]` percent-escaped, so distinct keys never share a stem.
/// Very long stems are truncated and suffixed with a hash of the full key.
#[must_use]
pub fn file_stem(key: &str) -> String {
    let without_scheme = key.split_once("://").map_or(key, |(_, rest)| rest);

    let mut stem = String::with_capacity(without_scheme.len());
    for byte in without_scheme.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_') {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }

    if stem.len() > MAX_STEM_LEN {
        stem.truncate(MAX_STEM_LEN);
        let _ = write!(stem, "~{:016x}", fnv1a(key.as_bytes()));
    }

    stem
}

/// 64-bit FNV-1a. Stems are persisted, so the hash must not change between
/// builds.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

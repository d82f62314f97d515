//! `InterceptionPolicy`: what to do with each request and response a browser
//! session sees.
//!
//! The decisions themselves ([`InterceptionPolicy::classify_request`] and
//! [`InterceptionPolicy::storage_plan`]) are pure functions of the request or
//! response metadata plus cache state, so they are tested without a browser.
//! The async wrappers consult and update the shared [`ResourceCache`].

use crate::entry::{cache_key, CacheEntry};
use crate::store::ResourceCache;
use chrono::{DateTime, Duration, Utc};
use regscope_core::{CacheConfig, CacheMode, ResourceKind};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Longest honoured `max-age` (ten years).
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// An outgoing request, as seen by the interception hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Absolute request URL
    pub url: String,
    /// Resource kind reported by the browser
    pub kind: ResourceKind,
    /// HTTP method
    pub method: String,
}

/// A response received for a passed-through request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    /// Absolute request URL
    pub url: String,
    /// Resource kind reported by the browser
    pub kind: ResourceKind,
    /// HTTP method of the originating request
    pub method: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
}

/// Verdict for an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDecision {
    /// Fail the request without touching the network
    Abort,
    /// Answer from the cache
    Serve(Arc<CacheEntry>),
    /// Let the network satisfy it
    PassThrough,
}

/// Why a response is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// URL has no cache key (no host, `data:` URL, ...)
    Unkeyable,
    /// Only `GET` responses are stored
    Method,
    /// Resource kind outside the cacheable allow-list
    Kind,
    /// Host or kind matches an exclusion rule
    Excluded,
    /// Non-success status
    Status,
    /// TTL mode and no positive `max-age`, or `no-store`
    NoDirective,
}

/// Verdict for an incoming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoragePlan {
    /// Do not store
    Skip(SkipReason),
    /// Store under `key`, expiring at `expires_at` (`None` = never)
    Store {
        /// Cache key
        key: String,
        /// Expiry
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Per-request and per-response caching rules.
#[derive(Debug, Clone)]
pub struct InterceptionPolicy {
    mode: CacheMode,
    excluded_hosts: Vec<String>,
    excluded_kinds: Vec<ResourceKind>,
    cacheable_kinds: Vec<ResourceKind>,
    cache: Arc<ResourceCache>,
}

impl InterceptionPolicy {
    /// Build the policy from configuration. The mode comes from the cache.
    #[must_use]
    pub fn new(config: &CacheConfig, cache: Arc<ResourceCache>) -> Self {
        Self {
            mode: cache.mode(),
            excluded_hosts: config
                .excluded_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            excluded_kinds: config.excluded_kinds.clone(),
            cacheable_kinds: config.cacheable_kinds.clone(),
            cache,
        }
    }

    /// The cache this policy reads and writes.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// Whether a request for `url` of `kind` is blocked outright.
    #[must_use]
    pub fn is_excluded(&self, url: &str, kind: ResourceKind) -> bool {
        if self.excluded_kinds.contains(&kind) {
            return true;
        }
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| self.host_is_excluded(&host))
    }

    fn host_is_excluded(&self, host: &str) -> bool {
        self.excluded_hosts.iter().any(|excluded| {
            host == excluded
                || host
                    .strip_suffix(excluded.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Decide a request given what the cache holds for it.
    #[must_use]
    pub fn classify_request(
        &self,
        request: &RequestDescriptor,
        cached: Option<Arc<CacheEntry>>,
    ) -> RequestDecision {
        if self.is_excluded(&request.url, request.kind) {
            return RequestDecision::Abort;
        }
        if !request.method.eq_ignore_ascii_case("GET") {
            return RequestDecision::PassThrough;
        }
        match cached {
            Some(entry) => RequestDecision::Serve(entry),
            None => RequestDecision::PassThrough,
        }
    }

    /// Decide a request, consulting the cache.
    pub async fn on_request(&self, request: &RequestDescriptor) -> RequestDecision {
        let cached = if self.is_excluded(&request.url, request.kind) {
            None
        } else {
            match cache_key(&request.url) {
                Some(key) => self.cache.lookup(&key).await,
                None => None,
            }
        };

        let decision = self.classify_request(request, cached);
        match &decision {
            RequestDecision::Abort => trace!(url = %request.url, "aborting request"),
            RequestDecision::Serve(_) => debug!(url = %request.url, "serving from cache"),
            RequestDecision::PassThrough => trace!(url = %request.url, "passing through"),
        }
        decision
    }

    /// Decide whether a response is stored, as of `now`.
    #[must_use]
    pub fn storage_plan(&self, response: &ResponseDescriptor, now: DateTime<Utc>) -> StoragePlan {
        let Some(key) = cache_key(&response.url) else {
            return StoragePlan::Skip(SkipReason::Unkeyable);
        };
        if !response.method.eq_ignore_ascii_case("GET") {
            return StoragePlan::Skip(SkipReason::Method);
        }
        if !self.cacheable_kinds.contains(&response.kind) {
            return StoragePlan::Skip(SkipReason::Kind);
        }
        if self.is_excluded(&response.url, response.kind) {
            return StoragePlan::Skip(SkipReason::Excluded);
        }
        if !(200..300).contains(&response.status) || response.status == 206 {
            return StoragePlan::Skip(SkipReason::Status);
        }

        match self.mode {
            CacheMode::Permanent => StoragePlan::Store {
                key,
                expires_at: None,
            },
            CacheMode::Ttl => {
                let directives = cache_control(&response.headers);
                if directives.is_some_and(|d| has_directive(d, "no-store")) {
                    return StoragePlan::Skip(SkipReason::NoDirective);
                }
                match max_age(&response.headers) {
                    Some(secs) if secs > 0 => {
                        let secs = i64::try_from(secs).unwrap_or(MAX_TTL_SECS).min(MAX_TTL_SECS);
                        StoragePlan::Store {
                            key,
                            expires_at: Some(now + Duration::seconds(secs)),
                        }
                    }
                    _ => StoragePlan::Skip(SkipReason::NoDirective),
                }
            }
        }
    }

    /// Store a response if eligible.
    ///
    /// A failure reading the body means the response is simply not cached.
    /// Returns whether an entry was written.
    pub async fn on_response<E: Display>(
        &self,
        response: &ResponseDescriptor,
        body: Result<Vec<u8>, E>,
    ) -> bool {
        let StoragePlan::Store { key, expires_at } = self.storage_plan(response, Utc::now()) else {
            return false;
        };

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %response.url, error = %e, "could not read response body, not caching");
                return false;
            }
        };

        let entry = CacheEntry::new(response.status, response.headers.clone(), body, expires_at);
        self.cache.store(&key, entry).await
    }
}

fn cache_control(headers: &[(String, String)]) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("cache-control"))
        .map(|(_, value)| value.as_str())
}

fn has_directive(value: &str, directive: &str) -> bool {
    value
        .split(',')
        .any(|d| d.trim().eq_ignore_ascii_case(directive))
}

/// Parse `max-age` from a `Cache-Control` header.
#[must_use]
pub fn max_age(headers: &[(String, String)]) -> Option<u64> {
    cache_control(headers)?.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

//! Regscope Cache - resource caching for controlled browser sessions.
//!
//! Browser sessions against the registry site re-request the same static
//! assets on every crawl. This crate collapses that to one network round trip
//! per resource per cache lifetime.
//!
//! # Architecture
//!
//! - **Entries** ([`entry`]): `CacheEntry` and URL normalisation into cache keys
//! - **Store** ([`store`]): `ResourceCache`, an in-memory index with on-disk persistence
//! - **Policy** ([`policy`]): `InterceptionPolicy`, the abort / serve / pass-through
//!   decision for requests and the storage decision for responses
//!
//! # Example
//!
//! ```rust
//! use regscope_cache::{cache_key, CacheEntry, ResourceCache};
//! use regscope_core::CacheMode;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = ResourceCache::in_memory(CacheMode::Permanent);
//! let key = cache_key("https://example.com/app.js?v=3").expect("valid url");
//!
//! cache
//!     .store(&key, CacheEntry::new(200, vec![], b"console.log(1)".to_vec(), None))
//!     .await;
//! assert!(cache.lookup(&key).await.is_some());
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod entry;
pub mod error;
pub mod policy;
pub mod store;

// Re-export commonly used types
pub use entry::{cache_key, file_stem, CacheEntry};
pub use error::CacheError;
pub use policy::{
    max_age, InterceptionPolicy, RequestDecision, RequestDescriptor, ResponseDescriptor,
    SkipReason, StoragePlan,
};
pub use store::ResourceCache;

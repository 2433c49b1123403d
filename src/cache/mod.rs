//! Memoization for Expensive Capabilities
//!
//! This module provides a generic caching decorator for any capability that
//! takes one structured argument and returns one value. Summaries produced by
//! the research loop are the main consumer: they are costly to generate and
//! are requested again whenever a query surfaces the same page in the same
//! conversation.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 digests of `name + "|" + canonical JSON of the argument`:
//! - Different capabilities never share entries, even for equal arguments
//! - The same argument always maps to the same key across processes
//! - Fields marked `#[serde(skip)]` (e.g. trace ids) never affect the key
//!
//! # Example
//!
//! ```ignore
//! use deepsearch::cache::{Cached, MemoryCacheStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryCacheStore::with_defaults());
//! let summarize = Cached::wrap("summarizeURL", summarizer, store);
//!
//! // First call invokes the summarizer, the second is served from the store
//! let a = summarize.invoke(&request).await?;
//! let b = summarize.invoke(&request).await?;
//! assert_eq!(a, b);
//! ```

/// The caching decorator and the capability trait it wraps.
pub mod decorator;
/// Key-value stores backing the decorator.
pub mod store;

pub use decorator::{CacheStats, Cached, Capability};
pub use store::{CacheStore, MemoryCacheStore, StoreConfig};

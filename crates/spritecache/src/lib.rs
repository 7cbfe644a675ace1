//! # spritecache
//!
//! Keyed single-flight cache for remote sprite assets.
//!
//! ## Architecture
//! - **AssetCache**: resolved values, in-flight keys and their waiter queues
//!   behind a single lock
//! - **Fetcher**: asynchronous key resolution, called at most once per
//!   in-flight period of a key
//! - **FsFetcher**: fetcher reading and decoding sprites from a directory
//!
//! ## Guarantees
//! - One fetcher call per key while it is in flight
//! - Every request is notified exactly once, in arrival order per key
//! - Resolved values are shared and never evicted
//! - Failures reach every waiter and leave the key free to retry

#![warn(missing_docs)]

mod cache;
mod error;
mod fetcher;
mod key;
mod sprite;
mod stats;

pub use cache::{AssetCache, Ticket};
pub use error::{Error, Result};
pub use fetcher::{fetcher_fn, Fetcher, FnFetcher, FsFetcher};
pub use key::AssetKey;
pub use sprite::{ImageFormat, Sprite};
pub use stats::CacheStats;

/// Sprite cache backed by a directory of images
pub type SpriteCache = AssetCache<FsFetcher>;

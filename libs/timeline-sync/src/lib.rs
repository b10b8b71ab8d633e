//! Tusk timeline synchronization engine
//!
//! Keeps paginated social feeds cached on the client with:
//! - Per-feed-key pages, deduplicated by item id
//! - Single-flight fetches per feed key
//! - Stale-while-revalidate invalidation, by key or by prefix
//! - Optimistic mutations with snapshot rollback across every feed
//! - Request-time notification filtering
//! - Metrics integration
//!
//! HTTP lives behind the [`ports::Transport`] trait; see the
//! `mastodon-client` crate for the reqwest implementation.

mod error;
mod metrics;

pub mod cache;
pub mod config;
pub mod engine;
pub mod feed_key;
pub mod model;
pub mod mutation;
pub mod normalizer;
pub mod notification_filter;
pub mod paginator;
pub mod ports;

pub use cache::{CacheEntry, EntrySnapshot, FetchOutcome, TimelineCache};
pub use config::EngineConfig;
pub use engine::{FeedHandle, FeedView, TimelineEngine};
pub use error::{HttpError, TimelineError, TimelineResult};
pub use feed_key::{FeedKey, FeedKeyPrefix, FeedKind};
pub use metrics::TimelineMetrics;
pub use model::{Item, Page};
pub use mutation::{MutationIntent, MutationOutcome, MutationState, StatusTarget};
pub use paginator::{FetchDirection, Paginator};
pub use ports::{ApiRequest, ApiResponse, Cursor, CursorLinks, Method};

//! Mastodon-compatible HTTP adapter for the timeline engine
//!
//! Provides:
//! - [`HttpTransport`]: reqwest transport with bearer auth and `Link` cursors
//! - [`SearchLookup`]: remote status resolution via `/api/v2/search`
//! - [`ClientConfig`] / [`Session`]: instance and credentials

mod error;

pub mod config;
pub mod link_header;
pub mod lookup;
pub mod transport;

pub use config::{ClientConfig, Session};
pub use error::{ClientError, ClientResult};
pub use link_header::parse_link_header;
pub use lookup::SearchLookup;
pub use transport::HttpTransport;

//! Remote status resolution through the instance's search endpoint

use async_trait::async_trait;
use std::sync::Arc;
use timeline_sync::ports::{StatusLookup, Transport};
use timeline_sync::{ApiRequest, HttpError};
use tracing::debug;

/// Maps a foreign status URI to the id the home instance knows it by.
///
/// Uses `GET /api/v2/search?q=<uri>&type=statuses&resolve=true&limit=1`.
pub struct SearchLookup {
    transport: Arc<dyn Transport>,
}

impl SearchLookup {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn request(uri: &str) -> ApiRequest {
        ApiRequest::get("search")
            .api_version(2)
            .param("q", uri)
            .param("type", "statuses")
            .param("resolve", "true")
            .param("limit", "1")
    }
}

#[async_trait]
impl StatusLookup for SearchLookup {
    async fn resolve_remote_status(&self, uri: &str) -> Result<Option<String>, HttpError> {
        let response = self.transport.request(Self::request(uri)).await?;
        let id = response
            .body
            .get("statuses")
            .and_then(|s| s.as_array())
            .and_then(|s| s.first())
            .and_then(|s| s.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string);

        debug!(uri, found = id.is_some(), "Searched for remote status");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request() {
        let req = SearchLookup::request("https://far.example/@bob/1");
        assert_eq!(req.path, "search");
        assert_eq!(req.api_version, 2);
        assert_eq!(req.param_value("q"), Some("https://far.example/@bob/1"));
        assert_eq!(req.param_value("type"), Some("statuses"));
        assert_eq!(req.param_value("resolve"), Some("true"));
        assert_eq!(req.param_value("limit"), Some("1"));
    }
}

//! reqwest implementation of the engine's transport seam

use crate::config::{ClientConfig, Session};
use crate::error::ClientResult;
use crate::link_header::parse_link_header;
use async_trait::async_trait;
use reqwest::header::LINK;
use reqwest::Client;
use std::time::Duration;
use timeline_sync::ports::Transport;
use timeline_sync::{ApiRequest, ApiResponse, CursorLinks, HttpError, Method};
use tracing::{debug, warn};

/// HTTP transport bound to one session
pub struct HttpTransport {
    client: Client,
    session: Session,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let session = Session::from_config(config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, request: &ApiRequest) -> String {
        format!(
            "{}{}",
            self.session.api_base(request.api_version),
            request.path.trim_start_matches('/')
        )
    }
}

/// Empty bodies decode to `null`
fn decode_body(text: &str) -> Result<serde_json::Value, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let url = self.url(&request);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }

        debug!(method = request.method.as_str(), url = %url, "Sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request failed before a response");
            HttpError::network(e.to_string())
        })?;

        let status = response.status();
        let links = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_else(CursorLinks::default);
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::network(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            let data = decode_body(&text).unwrap_or(serde_json::Value::String(text));
            debug!(url = %url, status = status.as_u16(), "Request rejected");
            return Err(HttpError::new(status.as_u16(), data));
        }

        let body = decode_body(&text).map_err(|e| HttpError {
            status: Some(status.as_u16()),
            data: serde_json::Value::String(format!("invalid JSON body: {}", e)),
        })?;

        Ok(ApiResponse { body, links })
    }
}

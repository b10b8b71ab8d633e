//! Client configuration and session

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Instance host, e.g. `mastodon.social`
    pub instance_domain: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(instance_domain: impl Into<String>) -> Self {
        Self {
            instance_domain: instance_domain.into(),
            access_token: None,
            account_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let instance_domain = std::env::var("TUSK_INSTANCE_DOMAIN")
            .map_err(|_| "TUSK_INSTANCE_DOMAIN must be set")?;

        Ok(ClientConfig {
            instance_domain,
            access_token: std::env::var("TUSK_ACCESS_TOKEN").ok(),
            account_id: std::env::var("TUSK_ACCOUNT_ID").ok(),
            request_timeout_secs: std::env::var("TUSK_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| default_request_timeout_secs().to_string())
                .parse()?,
            user_agent: std::env::var("TUSK_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("tusk-timeline/{}", env!("CARGO_PKG_VERSION"))
}

/// The signed-in account a transport acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    domain: String,
    token: Option<String>,
    account_id: Option<String>,
}

impl Session {
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let domain = config
            .instance_domain
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        if domain.is_empty() || domain.contains('/') {
            return Err(ClientError::Configuration(format!(
                "invalid instance domain: {:?}",
                config.instance_domain
            )));
        }

        Ok(Self {
            domain,
            token: config.access_token.clone().filter(|t| !t.is_empty()),
            account_id: config.account_id.clone(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// `https://{domain}/api/v{version}/`
    pub fn api_base(&self, version: u8) -> String {
        format!("https://{}/api/v{}/", self.domain, version)
    }
}

//! Collaborator seams the engine consumes
//!
//! The engine never talks HTTP itself. It hands an [`ApiRequest`] to a
//! [`Transport`] and receives the decoded body plus the cursor links parsed
//! from the response.

use crate::error::HttpError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Opaque pagination position lifted from a response link.
///
/// Holds the query parameters of the `next` link (`max_id`, `offset`, ...)
/// that are merged into the following request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(pub BTreeMap<String, String>);

impl Cursor {
    pub fn new<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Cursor(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn max_id(id: impl Into<String>) -> Self {
        Cursor::new([("max_id", id.into())])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn params(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Pagination links of one response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorLinks {
    pub next: Option<Cursor>,
    pub prev: Option<Cursor>,
}

/// One call against the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to `/api/v{api_version}/`
    pub path: String,
    /// Query parameters; repeated names (`types[]`) are allowed
    pub params: Vec<(String, String)>,
    /// Form body fields
    pub form: Vec<(String, String)>,
    pub api_version: u8,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            form: Vec::new(),
            api_version: 1,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Set a parameter, replacing any earlier value with the same name
    pub fn set_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.params.retain(|(n, _)| *n != name);
        self.params.push((name, value.into()));
        self
    }

    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Decoded response: JSON body plus pagination links
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub body: serde_json::Value,
    pub links: CursorLinks,
}

impl ApiResponse {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            links: CursorLinks::default(),
        }
    }

    pub fn with_next(mut self, cursor: Cursor) -> Self {
        self.links.next = Some(cursor);
        self
    }
}

/// Typed request function against the active session's instance.
///
/// Fails fast with [`HttpError`] on any non-2xx or network failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError>;
}

/// Feature-capability check for the active instance
pub trait Capabilities: Send + Sync {
    fn supports(&self, feature: &str) -> bool;
}

/// Account-scoped preference storage
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value);
}

/// Maps a status seen on a foreign instance to the local instance's id
#[async_trait]
pub trait StatusLookup: Send + Sync {
    async fn resolve_remote_status(&self, uri: &str) -> Result<Option<String>, HttpError>;
}

/// Fixed capability set, resolved once per session
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    features: HashSet<String>,
}

impl StaticCapabilities {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
        }
    }
}

impl Capabilities for StaticCapabilities {
    fn supports(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

/// Process-local preference store
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        self.values.write().insert(key.to_string(), value);
    }
}

/// Lookup for sessions that never see foreign-instance statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

#[async_trait]
impl StatusLookup for NoLookup {
    async fn resolve_remote_status(&self, _uri: &str) -> Result<Option<String>, HttpError> {
        Ok(None)
    }
}

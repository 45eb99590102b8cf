//! Remote Data Service Module
//!
//! The narrow interfaces through which the coordinator reaches the remote
//! data service, one item at a time or one group per call.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// == Request Kind ==
/// The kind of lookup a request performs. Batches are grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    UserProfile,
    ProfileStats,
    MediaMetadata,
    Custom(String),
}

impl RequestKind {
    pub fn as_str(&self) -> &str {
        match self {
            RequestKind::UserProfile => "user_profile",
            RequestKind::ProfileStats => "profile_stats",
            RequestKind::MediaMetadata => "media_metadata",
            RequestKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Remote Error ==
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// == Service Traits ==
/// Single-item access to the remote data service.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    async fn query(&self, kind: &RequestKind, params: &Value) -> Result<Value, RemoteError>;
}

/// Grouped access: many parameter sets of one kind in a single call.
#[async_trait]
pub trait GroupedRemoteService: Send + Sync {
    /// Returns results keyed by sub-key (see [`sub_key`](Self::sub_key)).
    /// Params with no entry in the map are "not found", not failures.
    async fn query_many(
        &self,
        kind: &RequestKind,
        params: Vec<Value>,
    ) -> Result<HashMap<String, Value>, RemoteError>;

    /// The key identifying `params` within a grouped result.
    fn sub_key(&self, _kind: &RequestKind, params: &Value) -> String {
        default_sub_key(params)
    }
}

/// A string param is its own sub-key; an object uses its `"id"` field;
/// anything else falls back to its JSON text.
pub fn default_sub_key(params: &Value) -> String {
    match params {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => params.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_kind_names() {
        assert_eq!(RequestKind::UserProfile.to_string(), "user_profile");
        assert_eq!(RequestKind::Custom("feed".into()).as_str(), "feed");
        assert_eq!(
            serde_json::to_value(RequestKind::ProfileStats).unwrap(),
            json!("profile_stats")
        );
    }

    #[test]
    fn test_default_sub_key() {
        assert_eq!(default_sub_key(&json!("u1")), "u1");
        assert_eq!(default_sub_key(&json!({"id": "u2", "fields": ["bio"]})), "u2");
        assert_eq!(default_sub_key(&json!({"id": 42})), "42");
        assert_eq!(default_sub_key(&json!(7)), "7");
        assert_eq!(default_sub_key(&json!({"slug": "x"})), r#"{"slug":"x"}"#);
    }
}

//! # Remote Client
//!
//! Talks to the two remote resources, `/user/progress` and `/user/star`.
//!
//! Every answer is an envelope `{ "code": .., "data": .. }`. A `code` of 200
//! is success; anything else carries the failure kind in `data.type`. The
//! envelope is classified into a closed [`RemoteOutcome`] here so that the
//! rest of the core never looks at raw payloads.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_library::ItemRecord;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const EXPIRED_TOKEN: &str = "expiry_token";
const MISSING_TOKEN: &str = "token_not_exist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteResource {
    Progress,
    Star,
}

impl RemoteResource {
    pub fn path(&self) -> &'static str {
        match self {
            RemoteResource::Progress => "/user/progress",
            RemoteResource::Star => "/user/star",
        }
    }
}

impl fmt::Display for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Classified answer of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome<T> {
    Ok(T),
    /// The credential expired; renew and re-issue the call.
    Expired,
    /// The service knows no credential for this session.
    MissingCredential,
    /// Any other failure reported by the service.
    Failed(String),
}

impl<T> RemoteOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteOutcome<U> {
        match self {
            RemoteOutcome::Ok(value) => RemoteOutcome::Ok(f(value)),
            RemoteOutcome::Expired => RemoteOutcome::Expired,
            RemoteOutcome::MissingCredential => RemoteOutcome::MissingCredential,
            RemoteOutcome::Failed(detail) => RemoteOutcome::Failed(detail),
        }
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// GET the full list held by the remote.
    async fn fetch(
        &self,
        resource: RemoteResource,
        token: &str,
    ) -> Result<RemoteOutcome<Vec<ItemRecord>>>;

    /// POST `{ "pid": [..] }`.
    async fn push(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> Result<RemoteOutcome<()>>;

    /// POST `{ "pid": [..], "type": "delete" }`.
    async fn delete(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> Result<RemoteOutcome<()>>;
}

#[derive(Serialize)]
struct MutationBody<'a> {
    pid: &'a [String],
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: serde_json::Value,
}

/// [`RemoteClient`] over the host [`HttpClient`].
pub struct HttpRemoteClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpRemoteClient {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, resource: RemoteResource) -> String {
        format!("{}{}", self.base_url, resource.path())
    }

    async fn mutate(
        &self,
        resource: RemoteResource,
        token: &str,
        body: MutationBody<'_>,
    ) -> Result<RemoteOutcome<()>> {
        let request = HttpRequest::post(self.url(resource))
            .bearer_token(token)
            .json(&body)?;

        let response = self.http_client.execute(request).await?;
        Ok(classify::<IgnoredAny>(&response)?.map(|_| ()))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch(
        &self,
        resource: RemoteResource,
        token: &str,
    ) -> Result<RemoteOutcome<Vec<ItemRecord>>> {
        let request = HttpRequest::get(self.url(resource)).bearer_token(token);
        let response = self.http_client.execute(request).await?;
        classify(&response)
    }

    async fn push(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> Result<RemoteOutcome<()>> {
        self.mutate(resource, token, MutationBody { pid: pids, kind: None })
            .await
    }

    async fn delete(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> Result<RemoteOutcome<()>> {
        self.mutate(
            resource,
            token,
            MutationBody {
                pid: pids,
                kind: Some("delete"),
            },
        )
        .await
    }
}

/// Classify a response envelope.
///
/// A body that is not an envelope is a failure outcome when the HTTP status
/// already says so, and a decode error otherwise.
pub(crate) fn classify<T: DeserializeOwned>(response: &HttpResponse) -> Result<RemoteOutcome<T>> {
    let envelope: Envelope = match response.json() {
        Ok(envelope) => envelope,
        Err(_) if !response.is_success() => {
            return Ok(RemoteOutcome::Failed(format!("HTTP {}", response.status)))
        }
        Err(e) => return Err(SyncError::Decode(e.to_string())),
    };

    if envelope.code == 200 {
        let payload = serde_json::from_value(envelope.data)
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        return Ok(RemoteOutcome::Ok(payload));
    }

    let kind = envelope.data.get("type").and_then(|t| t.as_str());
    debug!(code = envelope.code, kind = ?kind, "Remote call failed");

    Ok(match kind {
        Some(EXPIRED_TOKEN) => RemoteOutcome::Expired,
        Some(MISSING_TOKEN) => RemoteOutcome::MissingCredential,
        Some(other) => RemoteOutcome::Failed(other.to_string()),
        None => RemoteOutcome::Failed(format!("code {}", envelope.code)),
    })
}

/// Drop fetched records the local store would reject.
pub(crate) fn discard_invalid(
    resource: RemoteResource,
    records: Vec<ItemRecord>,
) -> Vec<ItemRecord> {
    let fetched = records.len();
    let valid: Vec<ItemRecord> = records
        .into_iter()
        .filter(|record| record.validate().is_ok())
        .collect();

    if valid.len() < fetched {
        warn!(
            %resource,
            dropped = fetched - valid.len(),
            "Ignoring remote records without a pid"
        );
    }
    valid
}

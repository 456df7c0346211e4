//! C1: the peer JSON-RPC client. Issues `get-pods-with-stats` (gossip) and
//! `get-stats` (direct probe) calls against a single `<base>/rpc` endpoint.

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call timeout, per spec.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Calls `get-pods-with-stats` against a seed's gossip endpoint and
    /// normalizes the shape-polymorphic response into a flat sequence of
    /// `PodInfo`. The legacy bare-array response form is accepted silently.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_pods(&self, seed_base_url: &str) -> Result<Vec<PodInfo>, RpcError> {
        let value: serde_json::Value = self
            .call(seed_base_url, "get-pods-with-stats")
            .await?;

        let pods = match value {
            serde_json::Value::Array(_) => serde_json::from_value::<Vec<PodInfo>>(value),
            serde_json::Value::Object(_) => {
                serde_json::from_value::<GossipView>(value).map(|v| v.pods)
            }
            other => {
                return Err(RpcError::Malformed {
                    url: rpc_url(seed_base_url),
                    reason: format!("expected array or object result, got {other}"),
                })
            }
        };

        pods.map_err(|err| RpcError::Malformed {
            url: rpc_url(seed_base_url),
            reason: err.to_string(),
        })
    }

    /// Calls `get-stats` against a peer's own `<probeBaseUrl>/rpc` endpoint.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_stats(&self, peer_base_url: &str) -> Result<Stats, RpcError> {
        self.call(peer_base_url, "get-stats").await
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        base_url: &str,
        method: &'static str,
    ) -> Result<T, RpcError> {
        let url = rpc_url(base_url);
        let scheme = url::Url::parse(base_url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_default();
        if scheme != "http" && scheme != "https" {
            return Err(RpcError::InvalidScheme { url, scheme });
        }

        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            id: 1,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    RpcError::Timeout {
                        url: url.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    RpcError::Transport {
                        url: url.clone(),
                        source,
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(RpcError::HttpStatus {
                url,
                status: response.status(),
            });
        }

        let envelope: JsonRpcResponse<T> = response.json().await.map_err(|source| {
            if source.is_timeout() {
                RpcError::Timeout {
                    url: url.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                RpcError::Malformed {
                    url: url.clone(),
                    reason: source.to_string(),
                }
            }
        })?;

        match envelope {
            JsonRpcResponse {
                error: Some(err), ..
            } => Err(RpcError::RpcError {
                url,
                code: err.code,
                message: err.message,
            }),
            JsonRpcResponse {
                result: Some(result),
                ..
            } => Ok(result),
            JsonRpcResponse { .. } => Err(RpcError::Malformed {
                url,
                reason: "response body had neither `result` nor `error`".to_string(),
            }),
        }
    }
}

fn rpc_url(base_url: &str) -> String {
    format!("{}/rpc", base_url.trim_end_matches('/'))
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    id: u32,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<JsonRpcErrorObj>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObj {
    code: i64,
    message: String,
}

/// The `{pods: [...], total_count: n}` shape of a gossip response.
#[derive(Deserialize)]
struct GossipView {
    pods: Vec<PodInfo>,
    #[allow(dead_code)]
    #[serde(default)]
    total_count: Option<u64>,
}

/// A single pod as reported by a seed's gossip view, normalized from either
/// response shape. `pubkey` is the only field the caller treats as required;
/// entries missing it are filtered out by the ingestion cycle, not here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodInfo {
    pub address: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub last_seen_timestamp: Option<i64>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub storage_committed: Option<i64>,
    #[serde(default)]
    pub storage_used: Option<i64>,
    #[serde(default)]
    pub storage_usage_percent: Option<f64>,
    #[serde(default)]
    pub uptime: Option<i64>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// The result of a `get-stats` probe.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Stats {
    #[serde(default)]
    pub uptime: Option<i64>,
    #[serde(default)]
    pub packets_received: Option<i64>,
    #[serde(default)]
    pub packets_sent: Option<i64>,
    #[serde(default)]
    pub total_bytes: Option<i64>,
    #[serde(default)]
    pub active_streams: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_pods_accepts_bare_array_and_wrapped_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": [{"address": "10.0.0.1:6000", "pubkey": "A"}],
            })))
            .mount(&server)
            .await;

        let client = PeerClient::new(DEFAULT_TIMEOUT);
        let pods = client.get_pods(&server.uri()).await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].pubkey.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn get_pods_rejects_non_http_scheme() {
        let client = PeerClient::new(DEFAULT_TIMEOUT);
        let err = client.get_pods("ftp://example.test").await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidScheme { .. }));
    }

    #[tokio::test]
    async fn get_stats_surfaces_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "boom"},
            })))
            .mount(&server)
            .await;

        let client = PeerClient::new(DEFAULT_TIMEOUT);
        let err = client.get_stats(&server.uri()).await.unwrap_err();
        match err {
            RpcError::RpcError { code, message, .. } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

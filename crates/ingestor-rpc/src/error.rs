/// Errors surfaced by a single JSON-RPC call against a seed or peer.
///
/// Every variant is local to one call: callers decide what a failure means
/// for the seed/peer it was made against, the client never retries on its
/// own.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("request to {url} did not complete within {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} returned a JSON-RPC error {code}: {message}")]
    RpcError {
        url: String,
        code: i64,
        message: String,
    },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("unsupported URL scheme {scheme:?} for {url}, only http/https are accepted")]
    InvalidScheme { url: String, scheme: String },
}

//! C2: the external credits HTTP client. A single GET against a configured
//! URL; malformed payloads are swallowed into an empty result rather than
//! failing the caller, per spec — credits ingestion never aborts a cycle.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct CreditsClient {
    http: reqwest::Client,
    url: url::Url,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodCredits {
    pub pod_id: String,
    pub credits: f64,
}

#[derive(Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    pods_credits: Vec<PodCredits>,
    #[allow(dead_code)]
    #[serde(default)]
    status: Option<String>,
}

impl CreditsClient {
    pub fn new(url: url::Url, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    /// Fetches the credits document. Returns an empty vec (never an error)
    /// on malformed payloads or non-2xx responses, since a credits-ingestion
    /// failure must not abort the caller's cycle; the caller is responsible
    /// for counting these as errors in its own metrics.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_storage_credits(&self) -> Result<Vec<PodCredits>, reqwest::Error> {
        let response = match self
            .http
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "credits request failed");
                return Ok(Vec::new());
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "credits endpoint returned non-2xx");
            return Ok(Vec::new());
        }

        match response.json::<CreditsResponse>().await {
            Ok(body) => Ok(body.pods_credits),
            Err(err) => {
                tracing::warn!(error = %err, "malformed credits payload");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_credits_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pods_credits": [{"pod_id": "A", "credits": 12.5}],
                "status": "ok",
            })))
            .mount(&server)
            .await;

        let client = CreditsClient::new(server.uri().parse().unwrap(), DEFAULT_TIMEOUT);
        let credits = client.get_storage_credits().await.unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].pod_id, "A");
    }

    #[tokio::test]
    async fn malformed_payload_yields_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CreditsClient::new(server.uri().parse().unwrap(), DEFAULT_TIMEOUT);
        let credits = client.get_storage_credits().await.unwrap();
        assert!(credits.is_empty());
    }
}

//! HTTP narrative generator client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use questforge_core::error::GeneratorError;
use questforge_core::generator::{NarrativeGenerator, NarrativeRequest, NarrativeResponse};

/// Client for a narrative generation service reachable over HTTP.
///
/// Posts the structured request as JSON and expects the structured response
/// back. Timeouts, non-success statuses, and undecodable bodies all map to
/// [`GeneratorError`]; the turn pipeline treats them identically.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGenerator {
    /// Creates a client for `endpoint`. `timeout` bounds the whole request.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::Backend` when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GeneratorError::Backend(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NarrativeGenerator for HttpGenerator {
    async fn generate(
        &self,
        request: NarrativeRequest,
    ) -> Result<NarrativeResponse, GeneratorError> {
        debug!(endpoint = %self.endpoint, action = %request.action, "requesting narrative");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::Backend(format!(
                "generator answered {status}"
            )));
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        parse_response(&body)
    }
}

fn classify_transport(err: reqwest::Error) -> GeneratorError {
    if err.is_timeout() {
        GeneratorError::Timeout
    } else {
        GeneratorError::Backend(err.to_string())
    }
}

/// Decodes and shape-checks a generator response body.
fn parse_response(body: &[u8]) -> Result<NarrativeResponse, GeneratorError> {
    let response: NarrativeResponse =
        serde_json::from_slice(body).map_err(|err| GeneratorError::Malformed(err.to_string()))?;
    if response.narrative.trim().is_empty() {
        return Err(GeneratorError::Malformed(
            "narrative text is empty".to_owned(),
        ));
    }
    Ok(response)
}

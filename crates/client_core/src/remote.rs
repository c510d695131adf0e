use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{ImageAsset, PredictionLabel, PredictionResult},
    protocol::{encode_data_url, PredictRequest, PredictResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ClientError, RemoteFailure},
    source::PredictionSource,
};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/predict";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RemotePredictorConfig {
    pub endpoint: Url,
    pub request_timeout: Duration,
}

impl RemotePredictorConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Posts the image as a data URL to the classification endpoint. One attempt
/// per call; retrying is left to the caller.
pub struct RemotePredictor {
    http: Client,
    config: RemotePredictorConfig,
}

impl RemotePredictor {
    pub fn new(config: RemotePredictorConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: RemotePredictorConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PredictionSource for RemotePredictor {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn predict(&self, image: &ImageAsset) -> Result<PredictionResult, ClientError> {
        let request = PredictRequest {
            image: encode_data_url(image.mime_type(), image.bytes()),
        };
        debug!(
            endpoint = %self.config.endpoint,
            filename = image.filename(),
            size_bytes = image.size_bytes(),
            "posting image to classification endpoint"
        );

        let response = self
            .http
            .post(self.config.endpoint.clone())
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|error| RemoteFailure::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteFailure::Status(status.as_u16()).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| RemoteFailure::Transport(error.to_string()))?;
        Ok(parse_predict_response(&body)?)
    }
}

pub(crate) fn parse_predict_response(body: &[u8]) -> Result<PredictionResult, RemoteFailure> {
    let reply: PredictResponse = serde_json::from_slice(body)
        .map_err(|error| RemoteFailure::Protocol(format!("malformed response body: {error}")))?;

    let label = PredictionLabel::from_wire(&reply.prediction).ok_or_else(|| {
        RemoteFailure::Protocol(format!("unknown prediction label {:?}", reply.prediction))
    })?;

    if !(0.0..=1.0).contains(&reply.confidence) {
        warn!(
            confidence = reply.confidence,
            "classification endpoint returned confidence outside [0, 1]; clamping"
        );
    }

    Ok(PredictionResult::new(label, reply.confidence, false))
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PREDICT_ROUTE: &str = "/api/predict";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// `data:<mime>;base64,<payload>`
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("image payload is empty")]
    Empty,
    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Decodes a data URL or a bare base64 string. Anything up to and including
/// the first `base64,` marker is ignored.
pub fn decode_data_url(raw: &str) -> Result<Vec<u8>, DataUrlError> {
    let payload = match raw.split_once("base64,") {
        Some((_, rest)) => rest,
        None => raw,
    };
    let bytes = STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(DataUrlError::Empty);
    }
    Ok(bytes)
}

//! Filename-keyed stand-in for the classification endpoint.
//!
//! Used only when the endpoint cannot be reached, so that resubmitting the
//! same file while offline keeps producing the same demo output. Never a
//! medical determination.

use async_trait::async_trait;
use shared::domain::{ImageAsset, PredictionLabel, PredictionResult};

use crate::{error::ClientError, source::PredictionSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicSimulator;

impl DeterministicSimulator {
    pub fn simulate(&self, image: &ImageAsset) -> Result<PredictionResult, ClientError> {
        simulate_filename(image.filename())
    }
}

#[async_trait]
impl PredictionSource for DeterministicSimulator {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn predict(&self, image: &ImageAsset) -> Result<PredictionResult, ClientError> {
        self.simulate(image)
    }
}

/// Sum of the UTF-16 code units of `filename`.
pub fn name_sum(filename: &str) -> u64 {
    filename.encode_utf16().map(u64::from).sum()
}

/// Positive when `name_sum % 10 > 6`; confidence is
/// `0.7 + (name_sum % 100) / 400`, so always within `[0.7, 0.9475]`.
pub fn simulate_filename(filename: &str) -> Result<PredictionResult, ClientError> {
    if filename.is_empty() {
        return Err(ClientError::SimulationFailed(
            "image filename is empty".to_string(),
        ));
    }

    let sum = name_sum(filename);
    let label = if sum % 10 > 6 {
        PredictionLabel::TbDetected
    } else {
        PredictionLabel::TbNotDetected
    };
    let confidence = 0.7 + (sum % 100) as f64 / 400.0;

    Ok(PredictionResult::new(label, confidence, true))
}

use serde::Serialize;
use shared::domain::{PredictionLabel, PredictionResult};

pub const DISCLAIMER: &str = "This is an AI prediction and should not be used as the sole basis \
for medical decisions. Please consult a healthcare professional.";

/// What a result card shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub label: PredictionLabel,
    pub confidence_percent: u8,
    pub simulated: bool,
}

impl ResultView {
    pub fn headline(&self) -> String {
        if self.simulated {
            format!("{} (simulated)", self.label)
        } else {
            self.label.to_string()
        }
    }
}

impl From<&PredictionResult> for ResultView {
    fn from(result: &PredictionResult) -> Self {
        Self {
            label: result.label(),
            confidence_percent: confidence_percent(result.confidence()),
            simulated: result.is_simulated(),
        }
    }
}

/// `round(confidence * 100)`, kept within `0..=100`.
pub fn confidence_percent(confidence: f64) -> u8 {
    if confidence.is_nan() {
        return 0;
    }
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

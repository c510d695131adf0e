//! Stand-in scorer for the reference endpoint.
//!
//! There is no model behind it: the mean byte value of the upload seeds a
//! `StdRng`, so the same file always gets the same answer and different
//! files spread across both labels.

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::PredictionLabel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub label: PredictionLabel,
    pub confidence: f64,
}

pub fn score_image(bytes: &[u8]) -> Score {
    let mut rng = StdRng::seed_from_u64(seed_for(bytes));
    let is_tb = rng.random::<f64>() > 0.6;
    let confidence = 0.7 + rng.random::<f64>() * 0.25;
    Score {
        label: if is_tb {
            PredictionLabel::TbDetected
        } else {
            PredictionLabel::TbNotDetected
        },
        confidence,
    }
}

/// Mean byte value scaled to `[0, 1]`, times 1000.
fn seed_for(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    let total: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
    let mean = total as f64 / bytes.len() as f64 / 255.0;
    (mean * 1000.0) as u64
}

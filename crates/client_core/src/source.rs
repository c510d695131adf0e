use async_trait::async_trait;
use shared::domain::{ImageAsset, PredictionResult};

use crate::error::ClientError;

/// Anything that can turn an image into a prediction.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn predict(&self, image: &ImageAsset) -> Result<PredictionResult, ClientError>;
}

use thiserror::Error;

/// Why a call to the classification endpoint did not yield a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("classification endpoint responded with status {0}")]
    Status(u16),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("remote prediction failed: {0}")]
    RemotePredictionFailed(#[from] RemoteFailure),
    #[error("simulation failed: {0}")]
    SimulationFailed(String),
}

pub mod controller;
pub mod display;
pub mod error;
pub mod preview;
pub mod remote;
pub mod simulator;
pub mod source;

pub use controller::{Notice, NoticeLevel, SubmissionController, WorkflowEvent, WorkflowState};
pub use display::ResultView;
pub use error::{ClientError, RemoteFailure};
pub use preview::{NoPreview, PreviewGuard, PreviewSink};
pub use remote::{RemotePredictor, RemotePredictorConfig};
pub use simulator::DeterministicSimulator;
pub use source::PredictionSource;

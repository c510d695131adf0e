//! Submission workflow: one image in, one result (or failure) out.
//!
//! `submit` moves the controller to `Processing` synchronously and resolves
//! the prediction on a spawned task. The latest submission wins: a task whose
//! id is no longer current finishes silently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::domain::{ImageAsset, PredictionLabel, PredictionResult, SubmissionId};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    display::ResultView,
    error::ClientError,
    preview::{NoPreview, PreviewGuard, PreviewSink},
    simulator::DeterministicSimulator,
    source::PredictionSource,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum WorkflowState {
    Idle,
    Processing(ImageAsset),
    Complete(PredictionResult),
    Errored(String),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing(_) => "processing",
            Self::Complete(_) => "complete",
            Self::Errored(_) => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Errored(_))
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            Self::Complete(result) => Some(result),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<PredictionLabel> {
        self.result().map(PredictionResult::label)
    }

    pub fn view(&self) -> Option<ResultView> {
        self.result().map(ResultView::from)
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Errored(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Non-blocking message for the user, shown next to whatever the state is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            description: description.into(),
        }
    }

    fn warning(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StateChanged {
        submission: SubmissionId,
        state: WorkflowState,
    },
    Notice {
        submission: SubmissionId,
        notice: Notice,
    },
}

impl WorkflowEvent {
    pub fn submission(&self) -> SubmissionId {
        match self {
            Self::StateChanged { submission, .. } | Self::Notice { submission, .. } => *submission,
        }
    }
}

enum Resolution {
    Remote(PredictionResult),
    Fallback {
        cause: ClientError,
        result: PredictionResult,
    },
    Failed(String),
}

struct ControllerState {
    current: SubmissionId,
    state: WorkflowState,
    preview: Option<PreviewGuard>,
}

pub struct SubmissionController {
    remote: Arc<dyn PredictionSource>,
    simulator: DeterministicSimulator,
    previews: Arc<dyn PreviewSink>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl SubmissionController {
    pub fn new(remote: Arc<dyn PredictionSource>) -> Arc<Self> {
        Self::new_with_preview_sink(remote, Arc::new(NoPreview))
    }

    pub fn new_with_preview_sink(
        remote: Arc<dyn PredictionSource>,
        previews: Arc<dyn PreviewSink>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            remote,
            simulator: DeterministicSimulator,
            previews,
            inner: Mutex::new(ControllerState {
                current: SubmissionId(0),
                state: WorkflowState::Idle,
                preview: None,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Events as a stream. Lagged receivers skip what they missed.
    pub fn event_stream(&self) -> impl Stream<Item = WorkflowEvent> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }

    pub fn state(&self) -> WorkflowState {
        self.lock().state.clone()
    }

    pub fn current_submission(&self) -> SubmissionId {
        self.lock().current
    }

    /// Starts a new run for `image`, superseding any run in progress.
    ///
    /// Subscribers see `Processing` before this returns. Must be called from
    /// within a tokio runtime.
    pub fn submit(self: &Arc<Self>, image: ImageAsset) -> Result<SubmissionId, ClientError> {
        if image.is_empty() {
            warn!(filename = image.filename(), "rejecting empty image payload");
            return Err(ClientError::InvalidInput(format!(
                "image '{}' has no content",
                image.filename()
            )));
        }

        let submission = {
            let mut guard = self.lock();
            let submission = SubmissionId(guard.current.0 + 1);
            if !matches!(guard.state, WorkflowState::Idle) {
                debug!(
                    superseded = guard.current.0,
                    submission = submission.0,
                    "new submission supersedes previous run"
                );
            }
            guard.current = submission;
            // Old preview goes before the new one is acquired.
            guard.preview = None;
            guard.preview = Some(PreviewGuard::acquire(&self.previews, &image));
            guard.state = WorkflowState::Processing(image.clone());
            self.publish(WorkflowEvent::StateChanged {
                submission,
                state: guard.state.clone(),
            });
            submission
        };

        info!(
            submission = submission.0,
            filename = image.filename(),
            size_bytes = image.size_bytes(),
            "image submitted"
        );

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.resolve(submission, image).await;
        });

        Ok(submission)
    }

    /// Abandons the current run, releases the preview and returns to `Idle`.
    pub fn reset(&self) {
        let mut guard = self.lock();
        let submission = SubmissionId(guard.current.0 + 1);
        guard.current = submission;
        guard.preview = None;
        guard.state = WorkflowState::Idle;
        self.publish(WorkflowEvent::StateChanged {
            submission,
            state: WorkflowState::Idle,
        });
        debug!(submission = submission.0, "workflow reset");
    }

    async fn resolve(&self, submission: SubmissionId, image: ImageAsset) {
        let resolution = match self.remote.predict(&image).await {
            Ok(result) => Resolution::Remote(result),
            Err(cause) => {
                if !self.is_current(submission) {
                    debug!(submission = submission.0, %cause, "superseded run failed remotely");
                    return;
                }
                warn!(
                    submission = submission.0,
                    source = self.remote.name(),
                    %cause,
                    "remote prediction failed; using deterministic simulation"
                );
                match self.simulator.simulate(&image) {
                    Ok(result) => Resolution::Fallback { cause, result },
                    Err(sim_error) => {
                        error!(submission = submission.0, %sim_error, "fallback simulation failed");
                        Resolution::Failed(format!("{cause}; {sim_error}"))
                    }
                }
            }
        };

        self.finish(submission, resolution);
    }

    fn finish(&self, submission: SubmissionId, resolution: Resolution) {
        let mut guard = self.lock();
        if guard.current != submission {
            debug!(
                submission = submission.0,
                current = guard.current.0,
                "discarding result of superseded submission"
            );
            return;
        }

        let state = match resolution {
            Resolution::Remote(result) => {
                self.notify(
                    submission,
                    Notice::info(
                        "Analysis Complete",
                        "The X-ray has been processed by the AI model.",
                    ),
                );
                WorkflowState::Complete(result)
            }
            Resolution::Fallback { cause, result } => {
                self.notify(
                    submission,
                    Notice::warning("Primary analysis unavailable", cause.to_string()),
                );
                self.notify(
                    submission,
                    Notice::info(
                        "Analysis Complete (Simulated)",
                        "The X-ray has been processed with the fallback simulation.",
                    ),
                );
                WorkflowState::Complete(result)
            }
            Resolution::Failed(reason) => {
                self.notify(submission, Notice::warning("Analysis failed", reason.clone()));
                WorkflowState::Errored(reason)
            }
        };

        if let Some(result) = state.result() {
            info!(
                submission = submission.0,
                label = %result.label(),
                confidence = result.confidence(),
                simulated = result.is_simulated(),
                "prediction complete"
            );
        }

        guard.state = state;
        self.publish(WorkflowEvent::StateChanged {
            submission,
            state: guard.state.clone(),
        });
    }

    fn is_current(&self, submission: SubmissionId) -> bool {
        self.lock().current == submission
    }

    fn notify(&self, submission: SubmissionId, notice: Notice) {
        self.publish(WorkflowEvent::Notice { submission, notice });
    }

    fn publish(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

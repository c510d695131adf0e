use super::*;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::PreviewId;
use tokio::sync::{broadcast::error::TryRecvError, oneshot};

use crate::error::RemoteFailure;

type Reply = Result<PredictionResult, ClientError>;

/// Holds each prediction until the test releases the gate for that filename.
#[derive(Default)]
struct GatedSource {
    gates: tokio::sync::Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
}

impl GatedSource {
    async fn gate(&self, filename: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(filename.to_string(), rx);
        tx
    }
}

#[async_trait]
impl PredictionSource for GatedSource {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn predict(&self, image: &ImageAsset) -> Reply {
        let gate = self.gates.lock().await.remove(image.filename());
        match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(RemoteFailure::Transport("gate dropped".to_string()).into())
            }),
            None => Err(RemoteFailure::Transport("no gate registered".to_string()).into()),
        }
    }
}

struct FixedSource(Reply);

#[async_trait]
impl PredictionSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn predict(&self, _image: &ImageAsset) -> Reply {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingPreviewSink {
    next: AtomicU64,
    acquired: std::sync::Mutex<Vec<PreviewId>>,
    released: std::sync::Mutex<Vec<PreviewId>>,
}

impl RecordingPreviewSink {
    fn acquired(&self) -> Vec<PreviewId> {
        self.acquired.lock().expect("acquired").clone()
    }

    fn released(&self) -> Vec<PreviewId> {
        self.released.lock().expect("released").clone()
    }
}

impl PreviewSink for RecordingPreviewSink {
    fn acquire(&self, _image: &ImageAsset) -> PreviewId {
        let id = PreviewId(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.acquired.lock().expect("acquired").push(id);
        id
    }

    fn release(&self, id: PreviewId) {
        self.released.lock().expect("released").push(id);
    }
}

fn image(name: &str) -> ImageAsset {
    ImageAsset::new(name, vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

fn detected(confidence: f64) -> Reply {
    Ok(PredictionResult::new(
        PredictionLabel::TbDetected,
        confidence,
        false,
    ))
}

fn unavailable() -> Reply {
    Err(RemoteFailure::Status(500).into())
}

async fn next_event(rx: &mut broadcast::Receiver<WorkflowEvent>) -> WorkflowEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within timeout")
        .expect("event channel open")
}

async fn until_terminal(rx: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = matches!(&event, WorkflowEvent::StateChanged { state, .. } if state.is_terminal());
        events.push(event);
        if done {
            return events;
        }
    }
}

async fn assert_quiet(rx: &mut broadcast::Receiver<WorkflowEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {outcome:?}");
}

fn states(events: &[WorkflowEvent]) -> Vec<(SubmissionId, &'static str)> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::StateChanged { submission, state } => Some((*submission, state.name())),
            WorkflowEvent::Notice { .. } => None,
        })
        .collect()
}

fn notices(events: &[WorkflowEvent]) -> Vec<Notice> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Notice { notice, .. } => Some(notice.clone()),
            WorkflowEvent::StateChanged { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn processing_is_published_before_submit_returns() {
    let source = Arc::new(GatedSource::default());
    let _gate = source.gate("scan1.png").await;
    let controller = SubmissionController::new(source);
    let mut rx = controller.subscribe();

    let submission = controller.submit(image("scan1.png")).expect("submit");

    match rx.try_recv().expect("processing already published") {
        WorkflowEvent::StateChanged {
            submission: seen,
            state: WorkflowState::Processing(held),
        } => {
            assert_eq!(seen, submission);
            assert_eq!(held.filename(), "scan1.png");
        }
        other => panic!("unexpected first event: {other:?}"),
    }
    assert!(matches!(controller.state(), WorkflowState::Processing(_)));
    assert_eq!(controller.current_submission(), submission);
}

#[tokio::test]
async fn remote_success_completes_without_simulation() {
    let controller = SubmissionController::new(Arc::new(FixedSource(detected(0.88))));
    let mut rx = controller.subscribe();

    let submission = controller.submit(image("scan1.png")).expect("submit");
    let events = until_terminal(&mut rx).await;

    assert_eq!(
        states(&events),
        vec![(submission, "processing"), (submission, "complete")]
    );
    let notices = notices(&events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
    assert_eq!(notices[0].title, "Analysis Complete");

    let state = controller.state();
    let result = state.result().expect("result");
    assert_eq!(result.label(), PredictionLabel::TbDetected);
    assert_eq!(result.confidence(), 0.88);
    assert!(!result.is_simulated());
    assert_eq!(
        state.view(),
        Some(ResultView {
            label: PredictionLabel::TbDetected,
            confidence_percent: 88,
            simulated: false,
        })
    );
}

#[tokio::test]
async fn remote_failure_falls_back_to_simulation() {
    let controller = SubmissionController::new(Arc::new(FixedSource(unavailable())));
    let mut rx = controller.subscribe();

    let submission = controller.submit(image("scan1.png")).expect("submit");
    let events = until_terminal(&mut rx).await;

    assert_eq!(
        states(&events),
        vec![(submission, "processing"), (submission, "complete")]
    );
    let notices = notices(&events);
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert!(notices[0].description.contains("500"), "{:?}", notices[0]);
    assert_eq!(notices[1].title, "Analysis Complete (Simulated)");

    let state = controller.state();
    let result = state.result().expect("result");
    assert!(result.is_simulated());
    assert_eq!(result.label(), PredictionLabel::TbNotDetected);
    assert_eq!(result.confidence(), 0.7 + 41.0 / 400.0);
    assert_eq!(state.view().map(|view| view.confidence_percent), Some(80));
}

#[tokio::test]
async fn empty_payload_is_rejected_without_processing() {
    let controller = SubmissionController::new(Arc::new(FixedSource(detected(0.9))));
    let mut rx = controller.subscribe();

    let err = controller
        .submit(ImageAsset::new("scan1.png", Vec::new()))
        .expect_err("empty payload");

    assert!(matches!(err, ClientError::InvalidInput(_)));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(controller.state(), WorkflowState::Idle));
    assert_eq!(controller.current_submission(), SubmissionId(0));
}

#[tokio::test]
async fn superseded_success_produces_no_transition() {
    let source = Arc::new(GatedSource::default());
    let first_gate = source.gate("first.png").await;
    let second_gate = source.gate("second.png").await;
    let controller = SubmissionController::new(source);
    let mut rx = controller.subscribe();

    let first = controller.submit(image("first.png")).expect("first");
    let second = controller.submit(image("second.png")).expect("second");
    assert!(second > first);

    first_gate.send(detected(0.99)).expect("release first");
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    second_gate
        .send(Ok(PredictionResult::new(
            PredictionLabel::TbNotDetected,
            0.61,
            false,
        )))
        .expect("release second");

    let events = until_terminal(&mut rx).await;
    assert_eq!(
        states(&events),
        vec![
            (first, "processing"),
            (second, "processing"),
            (second, "complete")
        ]
    );
    assert!(events[1..].iter().all(|event| event.submission() == second));
    assert_quiet(&mut rx).await;

    let state = controller.state();
    assert_eq!(state.label(), Some(PredictionLabel::TbNotDetected));
    assert_eq!(state.result().map(PredictionResult::confidence), Some(0.61));
}

#[tokio::test]
async fn superseded_failure_is_discarded_silently() {
    let source = Arc::new(GatedSource::default());
    let first_gate = source.gate("first.png").await;
    let second_gate = source.gate("second.png").await;
    let controller = SubmissionController::new(source);
    let mut rx = controller.subscribe();

    controller.submit(image("first.png")).expect("first");
    let second = controller.submit(image("second.png")).expect("second");

    second_gate.send(detected(0.8)).expect("release second");
    let events = until_terminal(&mut rx).await;
    assert_eq!(states(&events).last(), Some(&(second, "complete")));

    first_gate.send(unavailable()).expect("release first");
    assert_quiet(&mut rx).await;
    assert!(!controller
        .state()
        .result()
        .expect("still complete")
        .is_simulated());
}

#[tokio::test]
async fn reset_abandons_in_flight_run() {
    let source = Arc::new(GatedSource::default());
    let gate = source.gate("scan1.png").await;
    let controller = SubmissionController::new(source);
    let mut rx = controller.subscribe();

    let submission = controller.submit(image("scan1.png")).expect("submit");
    controller.reset();

    match next_event(&mut rx).await {
        WorkflowEvent::StateChanged { submission: seen, .. } => assert_eq!(seen, submission),
        other => panic!("unexpected event: {other:?}"),
    }
    match next_event(&mut rx).await {
        WorkflowEvent::StateChanged {
            state: WorkflowState::Idle,
            ..
        } => {}
        other => panic!("expected idle, got {other:?}"),
    }

    gate.send(detected(0.9)).expect("release");
    assert_quiet(&mut rx).await;
    assert!(matches!(controller.state(), WorkflowState::Idle));
}

#[tokio::test]
async fn simulation_failure_ends_in_errored() {
    let controller = SubmissionController::new(Arc::new(FixedSource(unavailable())));
    let mut rx = controller.subscribe();

    controller
        .submit(ImageAsset::new("", vec![1, 2, 3]))
        .expect("non-empty payload is accepted");
    let events = until_terminal(&mut rx).await;

    let last = states(&events).pop().expect("terminal");
    assert_eq!(last.1, "errored");
    let notices = notices(&events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Analysis failed");

    let state = controller.state();
    assert!(state.label().is_none());
    let reason = state.error_reason().expect("reason");
    assert!(reason.contains("simulation failed"), "{reason}");
    assert!(reason.contains("500"), "{reason}");
}

#[tokio::test]
async fn same_file_offline_gives_stable_results() {
    let controller = SubmissionController::new(Arc::new(FixedSource(unavailable())));
    let mut rx = controller.subscribe();

    controller.submit(image("chest-0042.png")).expect("first");
    until_terminal(&mut rx).await;
    let first = *controller.state().result().expect("first result");

    controller.submit(image("chest-0042.png")).expect("second");
    until_terminal(&mut rx).await;
    let second = *controller.state().result().expect("second result");

    assert_eq!(first, second);
    assert!(first.is_simulated());
}

#[tokio::test]
async fn previews_are_released_exactly_once() {
    let sink = Arc::new(RecordingPreviewSink::default());
    let controller = SubmissionController::new_with_preview_sink(
        Arc::new(FixedSource(detected(0.7))),
        sink.clone(),
    );
    let mut rx = controller.subscribe();

    controller.submit(image("a.png")).expect("a");
    until_terminal(&mut rx).await;
    assert!(sink.released().is_empty(), "preview kept while result shows");

    controller.submit(image("b.png")).expect("b");
    until_terminal(&mut rx).await;
    assert_eq!(sink.released(), vec![PreviewId(1)]);

    controller.reset();
    assert_eq!(sink.released(), vec![PreviewId(1), PreviewId(2)]);
    controller.reset();
    assert_eq!(sink.released().len(), 2, "reset without preview releases nothing");

    controller.submit(image("c.png")).expect("c");
    until_terminal(&mut rx).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while Arc::strong_count(&controller) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("resolution task finished");
    drop(controller);

    assert_eq!(sink.acquired(), vec![PreviewId(1), PreviewId(2), PreviewId(3)]);
    assert_eq!(sink.released(), sink.acquired());
}

#[tokio::test]
async fn event_stream_mirrors_broadcast() {
    let controller = SubmissionController::new(Arc::new(FixedSource(detected(0.9))));
    let stream = controller.event_stream();
    tokio::pin!(stream);

    let submission = controller.submit(image("scan1.png")).expect("submit");

    let mut seen = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("event within timeout")
    {
        let done = matches!(&event, WorkflowEvent::StateChanged { state, .. } if state.is_terminal());
        seen.push(event);
        if done {
            break;
        }
    }
    assert_eq!(
        states(&seen),
        vec![(submission, "processing"), (submission, "complete")]
    );
}

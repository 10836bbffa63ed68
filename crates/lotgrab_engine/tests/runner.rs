use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lotgrab_core::{
    DownloadId, DownloadPlanEntry, OrchestratorView, SessionState, StartRejection,
    SubscriptionState,
};
use lotgrab_engine::{
    run_session, DownloadDelta, DownloadRequest, DownloadService, EventHub, FailureKind,
    SubmitError, Subscription,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Outcome {
    Complete,
    Interrupt,
    Refuse,
    /// Never finishes unless cancelled.
    Hang,
}

struct ScriptedService {
    hub: Arc<EventHub>,
    next_id: AtomicU64,
    subscribes: AtomicUsize,
    script: Mutex<VecDeque<Outcome>>,
    submitted: Mutex<Vec<DownloadRequest>>,
    cancelled: Mutex<Vec<DownloadId>>,
}

impl ScriptedService {
    fn new(script: &[Outcome]) -> Self {
        Self {
            hub: EventHub::new(),
            next_id: AtomicU64::new(100),
            subscribes: AtomicUsize::new(0),
            script: Mutex::new(script.iter().copied().collect()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

impl DownloadService for ScriptedService {
    fn submit(&self, request: DownloadRequest) -> Result<DownloadId, SubmitError> {
        self.submitted.lock().unwrap().push(request.clone());
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Complete);
        if let Outcome::Refuse = outcome {
            return Err(SubmitError::InvalidDestination(request.destination));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let hub = self.hub.clone();
        match outcome {
            Outcome::Complete => {
                tokio::spawn(async move {
                    hub.emit(DownloadDelta::in_progress(id));
                    hub.emit(DownloadDelta::complete(id));
                });
            }
            Outcome::Interrupt => {
                tokio::spawn(async move {
                    hub.emit(DownloadDelta::interrupted(id, FailureKind::Network));
                });
            }
            Outcome::Refuse | Outcome::Hang => {}
        }
        Ok(id)
    }

    fn cancel(&self, id: DownloadId) {
        self.cancelled.lock().unwrap().push(id);
        self.hub.emit(DownloadDelta::interrupted(id, FailureKind::Cancelled));
    }

    fn subscribe(&self) -> Subscription {
        self.subscribes.fetch_add(1, Ordering::Relaxed);
        self.hub.subscribe()
    }
}

fn plan(n: usize) -> Vec<DownloadPlanEntry> {
    (1..=n)
        .map(|i| DownloadPlanEntry {
            source_url: format!("https://img.example.com/sale/{i}_1.jpg"),
            destination_path: format!("Sale/Item-{i:03}.jpg"),
        })
        .collect()
}

#[tokio::test]
async fn three_successes_complete_and_unsubscribe() {
    engine_logging::initialize_for_tests();
    let service = ScriptedService::new(&[]);
    let mut statuses = Vec::new();
    let mut observer = |view: &OrchestratorView| statuses.push(view.status.text.clone());

    let report = run_session(&service, plan(3), &CancellationToken::new(), &mut observer).await;

    assert!(report.completed());
    assert_eq!(report.view.completed, 3);
    assert_eq!(report.view.failed, 0);
    assert_eq!(report.view.status.text, "Download complete!");
    assert_eq!(report.view.status.ratio, 1.0);
    assert_eq!(report.view.subscription, SubscriptionState::Disposed);
    assert_eq!(service.hub.listener_count(), 0);
    assert_eq!(statuses.first().map(String::as_str), Some("Downloading 0 of 3..."));
    assert_eq!(statuses.last().map(String::as_str), Some("Download complete!"));

    let destinations: Vec<_> = service
        .submitted
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.destination.clone())
        .collect();
    assert_eq!(
        destinations,
        vec!["Sale/Item-001.jpg", "Sale/Item-002.jpg", "Sale/Item-003.jpg"]
    );
}

#[tokio::test]
async fn refused_submission_counts_as_failed() {
    let service = ScriptedService::new(&[Outcome::Refuse, Outcome::Complete, Outcome::Complete]);

    let report = run_session(&service, plan(3), &CancellationToken::new(), &mut |_: &OrchestratorView| {}).await;

    assert!(report.completed());
    assert_eq!(report.view.total, 3);
    assert_eq!((report.view.completed, report.view.failed), (2, 1));
    assert_eq!(report.view.submit_failures, 1);
    assert_eq!(report.view.status.text, "Download complete! 2 succeeded, 1 failed.");
}

#[tokio::test]
async fn every_submission_refused_still_finishes() {
    let service = ScriptedService::new(&[Outcome::Refuse, Outcome::Refuse]);

    let report = run_session(&service, plan(2), &CancellationToken::new(), &mut |_: &OrchestratorView| {}).await;

    assert!(report.completed());
    assert_eq!(report.view.failed, 2);
    assert_eq!(report.view.status.text, "Download complete! 0 succeeded, 2 failed.");
    assert_eq!(service.hub.listener_count(), 0);
}

#[tokio::test]
async fn interrupted_download_is_a_failure() {
    let service = ScriptedService::new(&[Outcome::Complete, Outcome::Interrupt]);

    let report = run_session(&service, plan(2), &CancellationToken::new(), &mut |_: &OrchestratorView| {}).await;

    assert_eq!((report.view.completed, report.view.failed), (1, 1));
    assert!((report.view.status.ratio - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn abort_cancels_outstanding_downloads() {
    let service = ScriptedService::new(&[Outcome::Complete, Outcome::Hang, Outcome::Hang]);
    let abort = CancellationToken::new();
    let trigger = abort.clone();
    let mut observer = move |view: &OrchestratorView| {
        if view.completed == 1 {
            trigger.cancel();
        }
    };

    let report = run_session(&service, plan(3), &abort, &mut observer).await;

    assert!(report.aborted());
    assert_eq!(report.view.completed, 1);
    assert_eq!(report.view.cancelled, 2);
    assert_eq!(report.view.status.text, "Operation aborted.");
    assert_eq!(service.cancelled.lock().unwrap().len(), 2);
    assert_eq!(service.hub.listener_count(), 0);
}

#[tokio::test]
async fn empty_plan_never_subscribes() {
    let service = ScriptedService::new(&[]);

    let report = run_session(&service, Vec::new(), &CancellationToken::new(), &mut |_: &OrchestratorView| {}).await;

    assert_eq!(report.view.session, SessionState::Idle);
    assert_eq!(report.view.last_rejection, Some(StartRejection::EmptyPlan));
    assert_eq!(report.view.status.text, "Ready.");
    assert_eq!(service.subscribes.load(Ordering::Relaxed), 0);
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use engine_logging::{engine_debug, engine_info, engine_warn};
use lotgrab_core::{
    update, DownloadPlanEntry, Effect, Msg, OrchestratorState, OrchestratorView, SessionState,
    SubscriptionState,
};
use tokio_util::sync::CancellationToken;

use crate::download::{DownloadService, Subscription};
use crate::DownloadRequest;

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// Receives the orchestrator view every time it changes.
pub trait SessionObserver: Send {
    fn on_view(&mut self, view: &OrchestratorView);
}

impl<F> SessionObserver for F
where
    F: FnMut(&OrchestratorView) + Send,
{
    fn on_view(&mut self, view: &OrchestratorView) {
        self(view)
    }
}

/// Final state of a session once the driver has stopped listening.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub run_id: u64,
    pub view: OrchestratorView,
}

impl SessionReport {
    pub fn completed(&self) -> bool {
        self.view.session == SessionState::Completed
    }

    pub fn aborted(&self) -> bool {
        self.view.session == SessionState::Aborted
    }
}

/// Runs one download session for `plan` against `service`.
///
/// Messages are applied one at a time. Submissions are acknowledged before
/// any service event is read, so a job is always tracked before its first
/// state change arrives. Cancelling `abort` is delivered once as an abort
/// click. Returns after the orchestrator unsubscribes, or straight away if
/// the start was rejected.
pub async fn run_session(
    service: &dyn DownloadService,
    plan: Vec<DownloadPlanEntry>,
    abort: &CancellationToken,
    observer: &mut dyn SessionObserver,
) -> SessionReport {
    let run_id = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
    let _run = engine_logging::enter_run(run_id);
    engine_info!("Starting session with {} planned downloads", plan.len());

    let mut state = OrchestratorState::new();
    let mut subscription: Option<Subscription> = None;
    let mut queue = VecDeque::from([Msg::StartRequested { plan }]);
    let mut abort_delivered = false;

    loop {
        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                execute(service, effect, &mut subscription, &mut queue);
            }
            if state.consume_dirty() {
                observer.on_view(&state.view());
            }
        }

        if state.subscription() != SubscriptionState::Active {
            break;
        }
        let Some(events) = subscription.as_mut() else {
            break;
        };

        let msg = tokio::select! {
            biased;
            _ = abort.cancelled(), if !abort_delivered => {
                abort_delivered = true;
                engine_info!("Abort requested");
                Msg::AbortClicked
            }
            delta = events.recv() => match delta {
                Some(delta) => {
                    if let Some(reason) = &delta.interrupt {
                        engine_warn!("download {} interrupted: {}", delta.id, reason);
                    }
                    Msg::JobStateChanged { id: delta.id, state: delta.state }
                }
                None => {
                    engine_warn!("download service closed the event stream");
                    Msg::Teardown
                }
            },
        };
        queue.push_back(msg);
    }

    let view = state.view();
    engine_info!("Session finished: {}", view.status.text);
    SessionReport { run_id, view }
}

fn execute(
    service: &dyn DownloadService,
    effect: Effect,
    subscription: &mut Option<Subscription>,
    queue: &mut VecDeque<Msg>,
) {
    match effect {
        Effect::Subscribe => {
            *subscription = Some(service.subscribe());
        }
        Effect::Submit {
            plan_index,
            url,
            destination,
        } => {
            let result = service
                .submit(DownloadRequest { url, destination })
                .map_err(|err| {
                    engine_warn!("submission {} refused: {}", plan_index, err);
                    err.to_string()
                });
            queue.push_back(Msg::SubmitAcked { plan_index, result });
        }
        Effect::Cancel { id } => service.cancel(id),
        Effect::Unsubscribe => {
            if let Some(mut events) = subscription.take() {
                events.dispose();
                engine_debug!("unsubscribed from download events");
            }
        }
    }
}

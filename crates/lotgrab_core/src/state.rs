use std::collections::{BTreeMap, BTreeSet};

use crate::view_model::{project_status, OrchestratorView};
use crate::{DownloadId, DownloadPlanEntry, Effect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// Lifecycle of the listener registered with the download service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    NeverStarted,
    Active,
    Disposed,
}

/// Why a start request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRejection {
    EmptyPlan,
    AlreadyRunning,
    /// An aborted run is still waiting on cancellation results.
    PreviousRunSettling,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrchestratorState {
    session: SessionState,
    subscription: SubscriptionState,
    plan: Vec<DownloadPlanEntry>,
    completed: usize,
    failed: usize,
    cancelled: usize,
    submit_failures: usize,
    /// Plan indices handed to the service whose acknowledgment is outstanding.
    awaiting_ack: BTreeSet<usize>,
    active_jobs: BTreeMap<DownloadId, usize>,
    /// Jobs that were asked to cancel and have not reported back yet.
    cancelling: BTreeMap<DownloadId, usize>,
    last_rejection: Option<StartRejection>,
    dirty: bool,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> OrchestratorView {
        OrchestratorView {
            session: self.session,
            subscription: self.subscription,
            total: self.total(),
            completed: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            submit_failures: self.submit_failures,
            active: self.active_jobs.len(),
            last_rejection: self.last_rejection,
            status: project_status(self.completed, self.failed, self.total(), self.session),
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn subscription(&self) -> SubscriptionState {
        self.subscription
    }

    pub fn total(&self) -> usize {
        self.plan.len()
    }

    pub fn plan_entry(&self, plan_index: usize) -> Option<&DownloadPlanEntry> {
        self.plan.get(plan_index)
    }

    pub fn active_job_ids(&self) -> impl Iterator<Item = DownloadId> + '_ {
        self.active_jobs.keys().copied()
    }

    /// True once the run is over and nothing more will be heard from the service.
    pub fn is_settled(&self) -> bool {
        self.session.is_terminal() && self.subscription != SubscriptionState::Active
    }

    /// Returns whether the view changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn reject_start(&mut self, reason: StartRejection) {
        self.last_rejection = Some(reason);
        self.mark_dirty();
    }

    pub(crate) fn start_rejection(&self, plan_is_empty: bool) -> Option<StartRejection> {
        if self.session == SessionState::Running {
            Some(StartRejection::AlreadyRunning)
        } else if self.subscription == SubscriptionState::Active {
            Some(StartRejection::PreviousRunSettling)
        } else if plan_is_empty {
            Some(StartRejection::EmptyPlan)
        } else {
            None
        }
    }

    /// Resets counters for a fresh run and returns the submit effects, in plan order.
    pub(crate) fn begin_run(&mut self, plan: Vec<DownloadPlanEntry>) -> Vec<Effect> {
        *self = Self {
            session: SessionState::Running,
            subscription: SubscriptionState::Active,
            awaiting_ack: (0..plan.len()).collect(),
            plan,
            dirty: true,
            ..Self::default()
        };

        let mut effects = Vec::with_capacity(self.plan.len() + 1);
        effects.push(Effect::Subscribe);
        effects.extend(self.plan.iter().enumerate().map(|(plan_index, entry)| {
            Effect::Submit {
                plan_index,
                url: entry.source_url.clone(),
                destination: entry.destination_path.clone(),
            }
        }));
        effects
    }

    /// Takes the outstanding acknowledgment for `plan_index`; false if none was owed.
    pub(crate) fn take_ack(&mut self, plan_index: usize) -> bool {
        self.awaiting_ack.remove(&plan_index)
    }

    pub(crate) fn track_job(&mut self, id: DownloadId, plan_index: usize) {
        self.active_jobs.insert(id, plan_index);
        self.mark_dirty();
    }

    pub(crate) fn track_cancelling(&mut self, id: DownloadId, plan_index: usize) {
        self.cancelling.insert(id, plan_index);
    }

    pub(crate) fn record_submit_failure(&mut self) {
        self.submit_failures += 1;
        self.failed += 1;
        self.mark_dirty();
    }

    pub(crate) fn take_active(&mut self, id: DownloadId) -> Option<usize> {
        self.active_jobs.remove(&id)
    }

    pub(crate) fn take_cancelling(&mut self, id: DownloadId) -> Option<usize> {
        self.cancelling.remove(&id)
    }

    pub(crate) fn record_success(&mut self) {
        self.completed += 1;
        self.mark_dirty();
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
        self.mark_dirty();
    }

    pub(crate) fn record_cancelled(&mut self) {
        self.cancelled += 1;
        self.mark_dirty();
    }

    /// Flips a running session to `Completed` once every entry is accounted for.
    pub(crate) fn check_completion(&mut self) {
        if self.session == SessionState::Running
            && self.awaiting_ack.is_empty()
            && self.active_jobs.is_empty()
            && self.completed + self.failed == self.total()
        {
            self.session = SessionState::Completed;
            self.mark_dirty();
        }
    }

    /// Moves a running session to `Aborted`, returning cancel effects for every active job.
    pub(crate) fn abort(&mut self) -> Vec<Effect> {
        self.session = SessionState::Aborted;
        self.mark_dirty();
        let active = std::mem::take(&mut self.active_jobs);
        let mut effects = Vec::with_capacity(active.len());
        for (id, plan_index) in active {
            self.cancelling.insert(id, plan_index);
            effects.push(Effect::Cancel { id });
        }
        effects
    }

    /// Forgets everything still owed by the service; used when the host goes away.
    pub(crate) fn forget_pending(&mut self) {
        self.awaiting_ack.clear();
        self.cancelling.clear();
    }

    /// Emits `Unsubscribe` once the session is terminal and nothing is left to hear about.
    pub(crate) fn dispose_if_settled(&mut self) -> Option<Effect> {
        let quiet = self.awaiting_ack.is_empty() && self.cancelling.is_empty();
        if self.session.is_terminal() && quiet {
            self.dispose()
        } else {
            None
        }
    }

    /// Tri-state disposal: only an active subscription yields an effect.
    pub(crate) fn dispose(&mut self) -> Option<Effect> {
        match self.subscription {
            SubscriptionState::Active => {
                self.subscription = SubscriptionState::Disposed;
                self.mark_dirty();
                Some(Effect::Unsubscribe)
            }
            SubscriptionState::NeverStarted | SubscriptionState::Disposed => None,
        }
    }
}

use crate::{SessionState, StartRejection, SubscriptionState};

/// Display text and progress ratio for the current counters.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub text: String,
    /// `completed / total`, in `0.0..=1.0`; zero when nothing is planned.
    pub ratio: f64,
}

/// Projects counters into status text. Holds no state of its own, so it is
/// safe to call on every event.
pub fn project_status(
    completed: usize,
    failed: usize,
    total: usize,
    session: SessionState,
) -> StatusView {
    let ratio = if total == 0 {
        0.0
    } else {
        completed.min(total) as f64 / total as f64
    };
    let text = match session {
        SessionState::Idle => "Ready.".to_string(),
        SessionState::Running => {
            format!("Downloading {} of {}...", completed + failed, total)
        }
        SessionState::Completed if failed == 0 => "Download complete!".to_string(),
        SessionState::Completed => {
            format!("Download complete! {completed} succeeded, {failed} failed.")
        }
        SessionState::Aborted => "Operation aborted.".to_string(),
    };
    StatusView { text, ratio }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorView {
    pub session: SessionState,
    pub subscription: SubscriptionState,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs whose cancellation landed after an abort.
    pub cancelled: usize,
    /// Entries the service refused outright; already included in `failed`.
    pub submit_failures: usize,
    pub active: usize,
    pub last_rejection: Option<StartRejection>,
    pub status: StatusView,
    pub dirty: bool,
}

use crate::{Effect, JobState, Msg, OrchestratorState, SessionState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages are processed one at a time to completion, so counters and job
/// tracking never race; terminal detection is recomputed after every message.
pub fn update(mut state: OrchestratorState, msg: Msg) -> (OrchestratorState, Vec<Effect>) {
    let mut effects = match msg {
        Msg::StartRequested { plan } => {
            if let Some(reason) = state.start_rejection(plan.is_empty()) {
                state.reject_start(reason);
                return (state, Vec::new());
            }
            state.begin_run(plan)
        }
        Msg::SubmitAcked { plan_index, result } => {
            if !state.take_ack(plan_index) {
                return (state, Vec::new());
            }
            match (state.session(), result) {
                (SessionState::Running, Ok(id)) => {
                    state.track_job(id, plan_index);
                    Vec::new()
                }
                // Accepted after the user aborted: cancel it straight away.
                (SessionState::Aborted, Ok(id)) => {
                    state.track_cancelling(id, plan_index);
                    vec![Effect::Cancel { id }]
                }
                (_, Ok(_)) => Vec::new(),
                (_, Err(_reason)) => {
                    state.record_submit_failure();
                    Vec::new()
                }
            }
        }
        Msg::JobStateChanged { id, state: job_state } => {
            if !job_state.is_terminal() {
                return (state, Vec::new());
            }
            if state.take_active(id).is_some() {
                match job_state {
                    JobState::Complete => state.record_success(),
                    _ => state.record_failure(),
                }
            } else if state.take_cancelling(id).is_some() {
                // The cancel request may lose the race against natural completion.
                match job_state {
                    JobState::Complete => state.record_success(),
                    _ => state.record_cancelled(),
                }
            }
            Vec::new()
        }
        Msg::AbortClicked => {
            if state.session() == SessionState::Running {
                state.abort()
            } else {
                Vec::new()
            }
        }
        Msg::Teardown => {
            let mut effects = if state.session() == SessionState::Running {
                state.abort()
            } else {
                Vec::new()
            };
            state.forget_pending();
            effects.extend(state.dispose());
            return (state, effects);
        }
    };

    state.check_completion();
    effects.extend(state.dispose_if_settled());
    (state, effects)
}

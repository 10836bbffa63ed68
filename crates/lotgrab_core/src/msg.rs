use crate::{DownloadId, DownloadPlanEntry, JobState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to download the given plan.
    StartRequested { plan: Vec<DownloadPlanEntry> },
    /// Download service answered a submission.
    SubmitAcked {
        plan_index: usize,
        result: Result<DownloadId, String>,
    },
    /// Download service reported a state change for a download.
    JobStateChanged { id: DownloadId, state: JobState },
    /// User clicked Abort.
    AbortClicked,
    /// Hosting front end is going away.
    Teardown,
}

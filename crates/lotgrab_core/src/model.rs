use serde::{Deserialize, Serialize};

/// Opaque handle issued by the download service for an accepted request.
pub type DownloadId = u64;

/// One auction lot as scraped from the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotRecord {
    pub thumbnail_url: String,
    pub title: String,
    #[serde(default)]
    pub is_pending: bool,
    pub lot_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlanEntry {
    pub source_url: String,
    /// Relative path below the download root, `/`-separated.
    pub destination_path: String,
}

/// User toggles that shape the download plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    pub skip_pending: bool,
    pub use_subfolders: bool,
    pub discover_all_images: bool,
}

/// State of a download as reported by the download service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    InProgress,
    Complete,
    Interrupted,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Interrupted)
    }
}

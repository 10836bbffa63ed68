use crate::DownloadId;

/// Side effects requested by [`crate::update`], executed by the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start listening for download state changes.
    Subscribe,
    /// Hand one plan entry to the download service.
    Submit {
        plan_index: usize,
        url: String,
        destination: String,
    },
    /// Best-effort cancellation of an accepted download.
    Cancel { id: DownloadId },
    /// Stop listening. Emitted at most once per subscription.
    Unsubscribe,
}

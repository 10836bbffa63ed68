use lotgrab_core::{OrchestratorView, StartRejection};
use lotgrab_engine::SessionObserver;

/// One progress line, e.g. `[ 40%] Downloading 2 of 5...`.
pub fn progress_line(view: &OrchestratorView) -> String {
    let percent = (view.status.ratio * 100.0).round() as u32;
    format!("[{percent:>3}%] {}", view.status.text)
}

pub fn rejection_text(reason: StartRejection) -> &'static str {
    match reason {
        StartRejection::EmptyPlan => "No images found to download.",
        StartRejection::AlreadyRunning => "A download is already running.",
        StartRejection::PreviousRunSettling => "The previous download is still stopping.",
    }
}

/// Prints a line to stdout whenever the progress text changes.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last: Option<String>,
}

impl ProgressPrinter {
    fn next_line(&mut self, view: &OrchestratorView) -> Option<String> {
        let line = progress_line(view);
        if self.last.as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last = Some(line.clone());
        Some(line)
    }
}

impl SessionObserver for ProgressPrinter {
    fn on_view(&mut self, view: &OrchestratorView) {
        if let Some(line) = self.next_line(view) {
            println!("{line}");
        }
    }
}

//! Lotgrab core: data model, name sanitizing, plan helpers and the pure
//! download orchestrator state machine.
mod effect;
mod model;
mod msg;
pub mod plan;
mod sanitize;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use model::{DownloadId, DownloadPlanEntry, JobState, LotRecord, PlanOptions};
pub use msg::Msg;
pub use sanitize::{sanitize_folder_name, sanitize_name, UNTITLED_FOLDER, UNTITLED_ITEM};
pub use state::{OrchestratorState, SessionState, StartRejection, SubscriptionState};
pub use update::update;
pub use view_model::{project_status, OrchestratorView, StatusView};

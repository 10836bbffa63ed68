use engine_logging::{engine_debug, engine_info};
use lotgrab_core::plan::{select_lots, sequenced_entries, thumbnail_entry};
use lotgrab_core::{DownloadPlanEntry, LotRecord, PlanOptions};
use tokio_util::sync::CancellationToken;

use crate::discovery::ImageDiscovery;

/// Ways a plan can come out with nothing to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("No items to process.")]
    NoLotsToProcess,
    #[error("Operation aborted.")]
    Cancelled,
}

/// Builds the ordered download plan for `lots`.
///
/// With `discover_all_images`, lots are resolved one at a time through
/// `discovery`; `cancel` is checked before each lot so an abort stops the
/// remaining lookups. A lot whose discovery fails or finds nothing falls back
/// to its thumbnail.
pub async fn build_plan(
    lots: &[LotRecord],
    base_folder: &str,
    options: &PlanOptions,
    mut discovery: Option<&mut (dyn ImageDiscovery + '_)>,
    cancel: &CancellationToken,
) -> Result<Vec<DownloadPlanEntry>, PlanError> {
    let selected = select_lots(lots, options);
    if selected.is_empty() {
        return Err(PlanError::NoLotsToProcess);
    }

    let mut plan = Vec::with_capacity(selected.len());
    if options.discover_all_images {
        engine_info!("Discovering all images for {} lots", selected.len());
        for lot in selected {
            if cancel.is_cancelled() {
                engine_info!("Discovery cancelled before lot {}", lot.lot_id);
                return Err(PlanError::Cancelled);
            }
            let images = match discovery.as_deref_mut() {
                Some(discovery) => discovery.discover(lot).await.unwrap_or_default(),
                None => Vec::new(),
            };
            engine_debug!("lot {} resolved to {} images", lot.lot_id, images.len());
            plan.extend(sequenced_entries(lot, &images, base_folder, options));
        }
    } else {
        plan.extend(
            selected
                .into_iter()
                .map(|lot| thumbnail_entry(lot, base_folder, options)),
        );
    }

    if cancel.is_cancelled() {
        return Err(PlanError::Cancelled);
    }
    Ok(plan)
}

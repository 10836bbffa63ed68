//! Lotgrab engine: page scraping, image discovery, downloads and the session
//! driver that executes the core orchestrator's effects.
mod convert;
mod decode;
mod discovery;
mod download;
mod fetch;
mod listing;
mod persist;
mod plan;
mod runner;
mod scrape;
mod types;

pub use convert::{
    encode_data_url, ConvertError, ConvertFormat, ConvertRequest, ConvertResponse, ImageConverter,
};
pub use decode::{decode_html, DecodeError};
pub use discovery::{DirectoryDiscovery, DiscoveryError, ImageDiscovery};
pub use download::{DownloadService, EventHub, ReqwestDownloadService, Subscription};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use listing::{is_lot_image, listing_hrefs, lot_images};
pub use persist::{ensure_output_dir, safe_relative_path, PersistError, StagedFile};
pub use plan::{build_plan, PlanError};
pub use runner::{run_session, SessionObserver, SessionReport};
pub use scrape::{
    is_dashboard_url, scrape_dashboard, ScrapeError, ScrapeResult, DASHBOARD_URL_MARKER,
    DEFAULT_AUCTION_NAME,
};
pub use types::{
    DownloadDelta, DownloadRequest, FailureKind, FetchError, FetchMetadata, FetchOutput,
    SubmitError,
};

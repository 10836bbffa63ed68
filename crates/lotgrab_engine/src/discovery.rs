use std::collections::HashMap;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};
use lotgrab_core::plan::directory_of;
use lotgrab_core::LotRecord;

use crate::decode::DecodeError;
use crate::fetch::Fetcher;
use crate::listing::{listing_hrefs, lot_images};
use crate::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("listing fetch failed for {url}: {source}")]
    Fetch { url: String, source: FetchError },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Resolves a lot into the file names of all its images.
#[async_trait::async_trait]
pub trait ImageDiscovery: Send {
    /// Image file names (relative to the thumbnail's directory) in listing order.
    /// An empty list means the listing had no matching files.
    async fn discover(&mut self, lot: &LotRecord) -> Result<Vec<String>, DiscoveryError>;
}

/// Discovers lot images from the web server's directory index next to the thumbnail.
///
/// Each directory is fetched at most once per instance; failures are not
/// cached, so a later lot in the same directory retries.
pub struct DirectoryDiscovery<F> {
    fetcher: F,
    cache: HashMap<String, Arc<Vec<String>>>,
}

impl<F: Fetcher> DirectoryDiscovery<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: HashMap::new(),
        }
    }

    /// Number of distinct directories listed so far.
    pub fn cached_directories(&self) -> usize {
        self.cache.len()
    }

    async fn listing(&mut self, directory_url: &str) -> Result<Arc<Vec<String>>, DiscoveryError> {
        if let Some(hit) = self.cache.get(directory_url) {
            engine_debug!("listing cache hit for {}", directory_url);
            return Ok(hit.clone());
        }

        let output = self
            .fetcher
            .fetch(directory_url)
            .await
            .map_err(|source| DiscoveryError::Fetch {
                url: directory_url.to_string(),
                source,
            })?;
        let hrefs = Arc::new(listing_hrefs(&output.text()?));
        engine_debug!("listed {} entries in {}", hrefs.len(), directory_url);
        self.cache.insert(directory_url.to_string(), hrefs.clone());
        Ok(hrefs)
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> ImageDiscovery for DirectoryDiscovery<F> {
    async fn discover(&mut self, lot: &LotRecord) -> Result<Vec<String>, DiscoveryError> {
        let directory_url = directory_of(&lot.thumbnail_url).to_string();
        match self.listing(&directory_url).await {
            Ok(listing) => Ok(lot_images(&listing, &lot.lot_id)),
            Err(err) => {
                engine_warn!("Failed to list directory {}: {}", directory_url, err);
                Err(err)
            }
        }
    }
}

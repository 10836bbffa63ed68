use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use engine_logging::{engine_debug, engine_info, engine_warn};
use lotgrab_core::DownloadId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fetch::{check_response, map_reqwest_error, read_capped, FetchSettings};
use crate::persist::{safe_relative_path, StagedFile};
use crate::{DownloadDelta, DownloadRequest, FailureKind, FetchError, SubmitError};

/// The platform download service the orchestrator drives.
///
/// `submit` must not block: it either refuses the request outright or hands
/// back an id whose progress is reported later to every subscriber.
pub trait DownloadService: Send + Sync {
    fn submit(&self, request: DownloadRequest) -> Result<DownloadId, SubmitError>;
    /// Best effort. Unknown or finished ids are ignored.
    fn cancel(&self, id: DownloadId);
    fn subscribe(&self) -> Subscription;
}

type ListenerId = u64;

/// Fan-out of download state changes to registered listeners.
#[derive(Default)]
pub struct EventHub {
    next_listener: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<DownloadDelta>>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, tx);
        Subscription {
            listener: Some(id),
            hub: Arc::downgrade(self),
            events: rx,
        }
    }

    /// Delivers `delta` to every listener; with none registered it is dropped.
    pub fn emit(&self, delta: DownloadDelta) {
        for tx in self.lock().values() {
            let _ = tx.send(delta.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: ListenerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ListenerId, mpsc::UnboundedSender<DownloadDelta>>> {
        // A poisoned map is still consistent: every operation is a single insert/remove.
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owned registration with an [`EventHub`]. Disposal is idempotent and also
/// happens on drop.
pub struct Subscription {
    listener: Option<ListenerId>,
    hub: Weak<EventHub>,
    events: mpsc::UnboundedReceiver<DownloadDelta>,
}

impl Subscription {
    /// Next event, or `None` once disposed and drained.
    pub async fn recv(&mut self) -> Option<DownloadDelta> {
        self.events.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Unregisters the listener. Returns false if it was already disposed.
    pub fn dispose(&mut self) -> bool {
        let Some(id) = self.listener.take() else {
            return false;
        };
        self.events.close();
        match self.hub.upgrade() {
            Some(hub) => hub.remove(id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Downloads over HTTP into files below a root directory.
#[derive(Clone)]
pub struct ReqwestDownloadService {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    client: reqwest::Client,
    max_bytes: u64,
    runtime: Handle,
    hub: Arc<EventHub>,
    next_id: AtomicU64,
    jobs: Mutex<HashMap<DownloadId, CancellationToken>>,
}

impl ReqwestDownloadService {
    /// Transfers run on `runtime`. Only the connect timeout, redirect limit
    /// and size cap of `settings` apply; any content type is accepted.
    pub fn new(root: PathBuf, settings: &FetchSettings, runtime: Handle) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                root,
                client,
                max_bytes: settings.max_bytes,
                runtime,
                hub: EventHub::new(),
                next_id: AtomicU64::new(1),
                jobs: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Downloads accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.jobs().len()
    }
}

impl DownloadService for ReqwestDownloadService {
    fn submit(&self, request: DownloadRequest) -> Result<DownloadId, SubmitError> {
        let url = reqwest::Url::parse(&request.url).map_err(|err| SubmitError::InvalidUrl {
            url: request.url.clone(),
            message: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmitError::InvalidUrl {
                url: request.url,
                message: "unsupported scheme".to_string(),
            });
        }
        let relative = safe_relative_path(&request.destination)
            .ok_or_else(|| SubmitError::InvalidDestination(request.destination.clone()))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.inner.jobs().insert(id, token.clone());
        engine_debug!("download {} accepted: {} -> {}", id, url, request.destination);

        let inner = self.inner.clone();
        self.inner
            .runtime
            .spawn(async move { run_transfer(inner, id, url, relative, token).await });
        Ok(id)
    }

    fn cancel(&self, id: DownloadId) {
        if let Some(token) = self.inner.jobs().get(&id) {
            engine_debug!("cancel requested for download {}", id);
            token.cancel();
        }
    }

    fn subscribe(&self) -> Subscription {
        self.inner.hub.subscribe()
    }
}

impl Inner {
    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<DownloadId, CancellationToken>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_transfer(
    inner: Arc<Inner>,
    id: DownloadId,
    url: reqwest::Url,
    relative: PathBuf,
    token: CancellationToken,
) {
    inner.hub.emit(DownloadDelta::in_progress(id));
    let result = tokio::select! {
        _ = token.cancelled() => Err(FailureKind::Cancelled),
        result = transfer(&inner, &url, &relative) => result,
    };
    inner.jobs().remove(&id);

    match result {
        Ok(path) => {
            engine_info!("download {} complete: {}", id, path.display());
            inner.hub.emit(DownloadDelta::complete(id));
        }
        Err(kind) => {
            engine_warn!("download {} interrupted ({}): {}", id, kind, url);
            inner.hub.emit(DownloadDelta::interrupted(id, kind));
        }
    }
}

async fn transfer(inner: &Inner, url: &reqwest::Url, relative: &Path) -> Result<PathBuf, FailureKind> {
    let response = inner
        .client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| map_reqwest_error(err).kind)?;
    check_response(&response, inner.max_bytes)?;

    // Staged only after the response looks usable, so refusals leave no file.
    let mut staged = StagedFile::create(&inner.root, relative).map_err(|_| FailureKind::Io)?;
    let written = read_capped(response, inner.max_bytes, |chunk| {
        staged.write_chunk(chunk).map_err(|_| FailureKind::Io)
    })
    .await?;
    engine_debug!("{} bytes received from {}", written, url);
    staged.commit().map_err(|_| FailureKind::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_dispose_is_idempotent() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        assert_eq!(hub.listener_count(), 1);

        hub.emit(DownloadDelta::complete(3));
        assert_eq!(sub.recv().await, Some(DownloadDelta::complete(3)));

        assert!(sub.dispose());
        assert!(!sub.dispose());
        assert!(!sub.is_active());
        assert_eq!(hub.listener_count(), 0);

        hub.emit(DownloadDelta::complete(4));
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let hub = EventHub::new();
        let sub = hub.subscribe();
        let _other = hub.subscribe();
        drop(sub);
        assert_eq!(hub.listener_count(), 1);
    }
}

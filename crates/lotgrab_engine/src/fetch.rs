use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Limits applied to every HTTP request the engine makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Whole-request limit for in-memory fetches. Downloads to disk ignore it.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Accepted media types; `type/*` accepts a whole family.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    /// Directory listings and dashboard pages.
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec!["text/html".into(), "application/xhtml+xml".into()],
        }
    }
}

impl FetchSettings {
    /// Lot images, either converted in memory or saved by the download service.
    pub fn for_images() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            allowed_content_types: vec!["image/*".into()],
            ..Self::default()
        }
    }
}

/// Fetches whole documents into memory.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// One client per fetch so the redirect policy can report how many hops it took.
    fn client_counting_redirects(&self, hops: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            hops.store(count, Ordering::Relaxed);
            if count >= limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let hops = Arc::new(AtomicUsize::new(0));
        let client = self.client_counting_redirects(hops.clone())?;

        let response = client.get(parsed).send().await.map_err(map_reqwest_error)?;
        check_response(&response, self.settings.max_bytes).map_err(FetchError::from)?;

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.as_deref() {
            if !is_allowed(&self.settings.allowed_content_types, ct) {
                return Err(FailureKind::UnsupportedContentType {
                    content_type: ct.to_string(),
                }
                .into());
            }
        }

        let mut bytes = Vec::new();
        read_capped(response, self.settings.max_bytes, |chunk| {
            bytes.extend_from_slice(chunk);
            Ok(())
        })
        .await?;

        let redirect_count = hops.load(Ordering::Relaxed);
        if redirect_count > 0 {
            engine_debug!("{} redirected {} times to {}", url, redirect_count, final_url);
        }
        engine_trace!("fetched {} bytes from {}", bytes.len(), url);

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count,
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

/// Refuses non-success statuses and bodies declared larger than `max_bytes`.
pub(crate) fn check_response(response: &reqwest::Response, max_bytes: u64) -> Result<(), FailureKind> {
    let status = response.status();
    if !status.is_success() {
        return Err(FailureKind::HttpStatus(status.as_u16()));
    }
    match response.content_length() {
        Some(declared) if declared > max_bytes => Err(FailureKind::TooLarge {
            max_bytes,
            actual: Some(declared),
        }),
        _ => Ok(()),
    }
}

/// Streams the body into `sink`, stopping once more than `max_bytes` arrived.
/// Returns the number of bytes passed on.
pub(crate) async fn read_capped<F>(
    response: reqwest::Response,
    max_bytes: u64,
    mut sink: F,
) -> Result<u64, FailureKind>
where
    F: FnMut(&[u8]) -> Result<(), FailureKind>,
{
    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| map_reqwest_error(err).kind)?;
        received += chunk.len() as u64;
        if received > max_bytes {
            return Err(FailureKind::TooLarge {
                max_bytes,
                actual: Some(received),
            });
        }
        sink(&chunk)?;
    }
    Ok(received)
}

fn is_allowed(allowed: &[String], content_type: &str) -> bool {
    let ct = content_type.split(';').next().unwrap_or(content_type).trim();
    allowed.iter().any(|allowed| match allowed.strip_suffix("/*") {
        Some(family) => ct
            .split_once('/')
            .is_some_and(|(ct_family, _)| ct_family.eq_ignore_ascii_case(family)),
        None => allowed.eq_ignore_ascii_case(ct),
    })
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::is_allowed;

    #[test]
    fn wildcard_families_match() {
        let allowed = vec!["image/*".to_string(), "text/html".to_string()];
        assert!(is_allowed(&allowed, "image/webp"));
        assert!(is_allowed(&allowed, "IMAGE/PNG"));
        assert!(is_allowed(&allowed, "text/html; charset=utf-8"));
        assert!(!is_allowed(&allowed, "text/plain"));
        assert!(!is_allowed(&allowed, "imagefoo"));
    }
}

use std::fmt;

use lotgrab_core::{DownloadId, JobState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<FailureKind> for FetchError {
    fn from(kind: FailureKind) -> Self {
        let message = kind.to_string();
        Self { kind, message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Cancelled,
    Io,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Io => write!(f, "file error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// A single file to fetch, as handed to a [`crate::DownloadService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Relative, `/`-separated path below the service's download root.
    pub destination: String,
}

/// State change reported by a download service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDelta {
    pub id: DownloadId,
    pub state: JobState,
    /// Set when `state` is `Interrupted`.
    pub interrupt: Option<FailureKind>,
}

impl DownloadDelta {
    pub fn in_progress(id: DownloadId) -> Self {
        Self {
            id,
            state: JobState::InProgress,
            interrupt: None,
        }
    }

    pub fn complete(id: DownloadId) -> Self {
        Self {
            id,
            state: JobState::Complete,
            interrupt: None,
        }
    }

    pub fn interrupted(id: DownloadId, reason: FailureKind) -> Self {
        Self {
            id,
            state: JobState::Interrupted,
            interrupt: Some(reason),
        }
    }
}

/// Immediate refusal of a download request; no id is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("invalid destination {0:?}")]
    InvalidDestination(String),
}

//! Image format conversion on a lazily started worker thread.
//!
//! The worker is set up at most once at a time: callers that arrive while it
//! is starting await the same shared setup future. [`ImageConverter::close`]
//! releases it and the next request starts a fresh one.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;

use base64::Engine as _;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use tokio::sync::oneshot;

use crate::fetch::Fetcher;
use crate::FetchError;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertFormat {
    #[default]
    Png,
    Jpeg,
}

impl ConvertFormat {
    /// `"jpeg"` selects JPEG; any other label falls back to PNG.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("jpeg") {
            Self::Jpeg
        } else {
            Self::Png
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertRequest {
    pub url: String,
    pub format: ConvertFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertResponse {
    Success { data_url: String },
    Failure { error: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Failed to fetch image: {0}")]
    Fetch(#[from] FetchError),
    #[error("image could not be converted: {0}")]
    Image(#[from] image::ImageError),
    #[error("conversion worker failed to start: {0}")]
    Setup(String),
    #[error("conversion worker stopped")]
    WorkerGone,
}

struct Job {
    bytes: Vec<u8>,
    format: ConvertFormat,
    reply: oneshot::Sender<Result<String, ConvertError>>,
}

struct Worker {
    jobs: mpsc::Sender<Job>,
}

type Setup = Shared<BoxFuture<'static, Result<Arc<Worker>, String>>>;

enum WorkerSlot {
    Absent,
    Creating(Setup),
    Ready(Arc<Worker>),
}

pub struct ImageConverter {
    fetcher: Arc<dyn Fetcher>,
    slot: Mutex<WorkerSlot>,
    workers_started: Arc<AtomicUsize>,
}

impl ImageConverter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            slot: Mutex::new(WorkerSlot::Absent),
            workers_started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many workers have been started over the converter's lifetime.
    pub fn workers_started(&self) -> usize {
        self.workers_started.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        !matches!(*self.slot(), WorkerSlot::Absent)
    }

    pub async fn convert(&self, request: ConvertRequest) -> ConvertResponse {
        match self.try_convert(&request).await {
            Ok(data_url) => ConvertResponse::Success { data_url },
            Err(err) => {
                engine_warn!("conversion of {} failed: {}", request.url, err);
                ConvertResponse::Failure {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Drops the worker. Jobs already queued still finish.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.slot(), WorkerSlot::Absent);
        if !matches!(previous, WorkerSlot::Absent) {
            engine_info!("conversion worker closed");
        }
    }

    async fn try_convert(&self, request: &ConvertRequest) -> Result<String, ConvertError> {
        let output = self.fetcher.fetch(&request.url).await?;
        let worker = self.worker().await?;
        let (reply, response) = oneshot::channel();
        worker
            .jobs
            .send(Job {
                bytes: output.bytes,
                format: request.format,
                reply,
            })
            .map_err(|_| ConvertError::WorkerGone)?;
        response.await.map_err(|_| ConvertError::WorkerGone)?
    }

    async fn worker(&self) -> Result<Arc<Worker>, ConvertError> {
        let setup = {
            let mut slot = self.slot();
            match &*slot {
                WorkerSlot::Ready(worker) => return Ok(worker.clone()),
                WorkerSlot::Creating(setup) => setup.clone(),
                WorkerSlot::Absent => {
                    let setup = start_worker(self.workers_started.clone()).boxed().shared();
                    *slot = WorkerSlot::Creating(setup.clone());
                    setup
                }
            }
        };

        let result = setup.clone().await;
        let mut slot = self.slot();
        // Only settle the slot if close() did not replace this setup meanwhile.
        if let WorkerSlot::Creating(current) = &*slot {
            if current.ptr_eq(&setup) {
                *slot = match &result {
                    Ok(worker) => WorkerSlot::Ready(worker.clone()),
                    Err(_) => WorkerSlot::Absent,
                };
            }
        }
        result.map_err(ConvertError::Setup)
    }

    fn slot(&self) -> MutexGuard<'_, WorkerSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn start_worker(started: Arc<AtomicUsize>) -> Result<Arc<Worker>, String> {
    let (jobs, queue) = mpsc::channel::<Job>();
    let (ready_tx, ready_rx) = oneshot::channel();

    thread::Builder::new()
        .name("lotgrab-convert".to_string())
        .spawn(move || {
            let _ = ready_tx.send(());
            while let Ok(job) = queue.recv() {
                let result = encode_data_url(&job.bytes, job.format);
                let _ = job.reply.send(result);
            }
        })
        .map_err(|err| err.to_string())?;

    ready_rx
        .await
        .map_err(|_| "worker exited during setup".to_string())?;
    let n = started.fetch_add(1, Ordering::Relaxed) + 1;
    engine_debug!("conversion worker #{} ready", n);
    Ok(Arc::new(Worker { jobs }))
}

/// Decodes any supported image and re-encodes it as a base64 `data:` URL.
pub fn encode_data_url(bytes: &[u8], format: ConvertFormat) -> Result<String, ConvertError> {
    let image = image::load_from_memory(bytes)?;
    let mut encoded = Vec::new();
    match format {
        ConvertFormat::Png => image.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?,
        ConvertFormat::Jpeg => {
            // JPEG has no alpha channel.
            JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&image.to_rgb8())?
        }
    }
    Ok(format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(&encoded)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn labels_other_than_jpeg_mean_png() {
        assert_eq!(ConvertFormat::from_label("JPEG"), ConvertFormat::Jpeg);
        assert_eq!(ConvertFormat::from_label("webp"), ConvertFormat::Png);
    }

    #[test]
    fn png_becomes_jpeg_data_url() {
        let url = encode_data_url(&tiny_png(), ConvertFormat::Jpeg).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = encode_data_url(b"not an image", ConvertFormat::Png).unwrap_err();
        assert!(matches!(err, ConvertError::Image(_)));
    }
}

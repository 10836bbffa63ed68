use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use lotgrab_engine::{
    ConvertFormat, ConvertRequest, ConvertResponse, FailureKind, FetchError, FetchMetadata,
    FetchOutput, Fetcher, ImageConverter,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 200, 30, 128]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Serves the same PNG for every URL.
struct StaticImage(Vec<u8>);

#[async_trait]
impl Fetcher for StaticImage {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        tokio::task::yield_now().await;
        Ok(FetchOutput {
            bytes: self.0.clone(),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: Some("image/png".to_string()),
                byte_len: self.0.len() as u64,
            },
        })
    }
}

fn request(format: ConvertFormat) -> ConvertRequest {
    ConvertRequest {
        url: "https://img.example.com/101_1.png".to_string(),
        format,
    }
}

fn data_url(response: ConvertResponse) -> String {
    match response {
        ConvertResponse::Success { data_url } => data_url,
        ConvertResponse::Failure { error } => panic!("conversion failed: {error}"),
    }
}

#[tokio::test]
async fn concurrent_requests_share_one_worker() {
    let converter = ImageConverter::new(Arc::new(StaticImage(png_bytes())));

    let (a, b, c) = tokio::join!(
        converter.convert(request(ConvertFormat::Png)),
        converter.convert(request(ConvertFormat::Jpeg)),
        converter.convert(request(ConvertFormat::Png)),
    );

    assert!(data_url(a).starts_with("data:image/png;base64,"));
    assert!(data_url(b).starts_with("data:image/jpeg;base64,"));
    assert!(data_url(c).starts_with("data:image/png;base64,"));
    assert_eq!(converter.workers_started(), 1);
}

#[tokio::test]
async fn close_releases_worker_and_next_request_recreates_it() {
    let converter = ImageConverter::new(Arc::new(StaticImage(png_bytes())));

    data_url(converter.convert(request(ConvertFormat::Png)).await);
    assert!(converter.is_open());

    converter.close();
    assert!(!converter.is_open());
    converter.close();

    data_url(converter.convert(request(ConvertFormat::Jpeg)).await);
    assert_eq!(converter.workers_started(), 2);
}

#[tokio::test]
async fn fetch_failure_is_reported_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let fetcher = lotgrab_engine::ReqwestFetcher::new(lotgrab_engine::FetchSettings::for_images());
    let converter = ImageConverter::new(Arc::new(fetcher));

    let response = converter
        .convert(ConvertRequest {
            url: format!("{}/gone.png", server.uri()),
            format: ConvertFormat::Png,
        })
        .await;

    match response {
        ConvertResponse::Failure { error } => {
            assert!(error.starts_with("Failed to fetch image"), "{error}");
            assert!(error.contains(&FailureKind::HttpStatus(404).to_string()));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // The fetch failed before any worker was needed.
    assert_eq!(converter.workers_started(), 0);
}

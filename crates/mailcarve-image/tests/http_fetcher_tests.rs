//! HTTP fetcher behavior against a live mock server.

use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailcarve_image::{HttpImageFetcher, ImageError, ImageFetcher, ImageResolver};

fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

#[tokio::test]
async fn prefix_fetch_sends_a_range_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/design.png"))
        .and(header("Range", "bytes=0-65535"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(png_header(600, 5400)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpImageFetcher::new();
    let bytes = fetcher
        .fetch_prefix(&format!("{}/design.png", server.uri()), 64 * 1024)
        .await
        .unwrap();
    assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn ignored_range_is_truncated_locally() {
    let server = MockServer::start().await;
    // Full 200 body despite the range request.
    let mut body = png_header(600, 5400);
    body.resize(4096, 0);
    Mock::given(method("GET"))
        .and(path("/design.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let fetcher = HttpImageFetcher::new();
    let bytes = fetcher
        .fetch_prefix(&format!("{}/design.png", server.uri()), 64)
        .await
        .unwrap();
    assert_eq!(bytes.len(), 64);
}

#[tokio::test]
async fn error_status_surfaces_to_the_resolver() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver = ImageResolver::new(Arc::new(HttpImageFetcher::new()));
    let err = resolver
        .resolve(&format!("{}/gone.png", server.uri()), 600, 5400)
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Status { status: 404 }));
}

#[tokio::test]
async fn resolver_corrects_stale_dimensions_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/design.png"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(png_header(600, 5400)))
        .mount(&server)
        .await;

    let resolver = ImageResolver::new(Arc::new(HttpImageFetcher::new()));
    let image = resolver
        .resolve(&format!("{}/design.png", server.uri()), 600, 5000)
        .await
        .unwrap();
    assert_eq!(image.height, 5400);
    assert!(image.corrected);
}

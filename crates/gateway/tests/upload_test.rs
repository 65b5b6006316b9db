mod support;

use axum::{
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use image::ImageFormat;
use support::*;
use tower::ServiceExt;

#[tokio::test]
async fn png_upload_is_normalized_and_forwarded() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("seven.png", "image/png", &digit_png(280, 280)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_bytes(response).await, b"7");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1, "Exactly one backend call per upload");
    let parts = &requests[0];
    assert_eq!(parts.len(), 1);

    let part = &parts[0];
    assert_eq!(part.name, "uploadFile");
    assert_eq!(part.filename.as_deref(), Some("seven.png"));
    assert_eq!(part.content_type.as_deref(), Some("image/png"));

    let forwarded = image::load_from_memory_with_format(&part.bytes, ImageFormat::Png).unwrap();
    assert_eq!((forwarded.width(), forwarded.height()), (28, 28));
    assert_eq!(forwarded.color(), image::ColorType::L8);
}

#[tokio::test]
async fn jpeg_upload_stays_jpeg() {
    let backend = MockBackend::start(StatusCode::OK, "3").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("three.jpg", "image/jpeg", &digit_jpeg(64, 48)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"3");

    let part = &backend.requests()[0][0];
    assert_eq!(part.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(&part.bytes[..2], &[0xFF, 0xD8]);

    let forwarded = image::load_from_memory_with_format(&part.bytes, ImageFormat::Jpeg).unwrap();
    assert_eq!((forwarded.width(), forwarded.height()), (28, 28));
}

#[tokio::test]
async fn sniffing_ignores_declared_content_type() {
    let backend = MockBackend::start(StatusCode::OK, "1").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("digit.bin", "application/octet-stream", &digit_png(40, 40)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let part = &backend.requests()[0][0];
    assert_eq!(part.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn backend_content_type_is_relayed() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("seven.png", "image/png", &digit_png(28, 28)))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn unreachable_backend_is_500_and_gateway_recovers() {
    let addr = reserve_addr();
    let config = test_config(backend_url(addr));
    let app = app(&config);

    let response = app
        .clone()
        .oneshot(file_upload("seven.png", "image/png", &digit_png(56, 56)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(response).await, b"prediction service unavailable");

    // Same router, same pooled client: the backend comes back on the same port.
    let backend = MockBackend::start_on(addr, StatusCode::OK, "7").await;
    let response = app
        .oneshot(file_upload("seven.png", "image/png", &digit_png(56, 56)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"7");
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn backend_error_is_500_without_leaking_body() {
    let backend = MockBackend::start(StatusCode::SERVICE_UNAVAILABLE, "Traceback: model not loaded").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("seven.png", "image/png", &digit_png(28, 28)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    assert_eq!(body, b"prediction service error");
    assert!(!String::from_utf8_lossy(&body).contains("Traceback"));
}

#[tokio::test]
async fn text_file_named_png_is_rejected() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("digit.png", "image/png", b"definitely not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"unsupported image format");
    assert!(backend.requests().is_empty(), "Rejected uploads must not reach the backend");
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let response = app(&config)
        .oneshot(file_upload("digit.png", "image/png", b""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"unsupported image format");
    assert!(backend.requests().is_empty(), "Empty uploads must not reach the backend");
}

#[tokio::test]
async fn truncated_png_is_500() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let png = digit_png(128, 128);
    let truncated = &png[..png.len() / 2];

    let response = app(&config)
        .oneshot(file_upload("digit.png", "image/png", truncated))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(response).await, b"failed to process image");
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn missing_file_field_is_400() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let body = multipart_body("picture", "digit.png", "image/png", &digit_png(28, 28));
    let response = app(&config).oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"malformed upload request");
}

#[tokio::test]
async fn non_multipart_body_is_400() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let config = test_config(backend.url());

    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"imgUrl": "data:image/png;base64,AAAA"}"#))
        .unwrap();
    let response = app(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversize_file_is_413() {
    let backend = MockBackend::start(StatusCode::OK, "7").await;
    let mut config = test_config(backend.url());
    config.max_upload_bytes = 1024;

    let mut payload = digit_png(28, 28);
    payload.resize(4096, 0);

    let response = app(&config)
        .oneshot(file_upload("digit.png", "image/png", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_bytes(response).await, b"upload exceeds size limit");
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn health_returns_ok() {
    let config = test_config(unreachable_url());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn static_frontend_is_served_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<canvas id=\"digit\"></canvas>").unwrap();

    let mut config = test_config(unreachable_url());
    config.static_dir = Some(dir.path().to_path_buf());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<canvas id=\"digit\"></canvas>");
}

#[tokio::test]
async fn unknown_route_is_404_without_static_dir() {
    let config = test_config(unreachable_url());

    let request = Request::builder().uri("/index.html").body(Body::empty()).unwrap();
    let response = app(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::{Multipart, State},
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::post,
};
use gateway::{AppState, GatewayConfig, router};
use image::{DynamicImage, ImageFormat, Luma, Rgb, RgbImage};
use reqwest::Url;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOUNDARY: &str = "----gateway-test-boundary";

/// One multipart part as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: &'static str,
    requests: Arc<Mutex<Vec<Vec<RecordedPart>>>>,
}

/// Inference backend stand-in listening on an ephemeral port.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<RecordedPart>>>>,
}

impl MockBackend {
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        Self::start_on(SocketAddr::from(([127, 0, 0, 1], 0)), status, body).await
    }

    /// Bind a specific address, e.g. one handed out by [`reserve_addr`].
    pub async fn start_on(addr: SocketAddr, status: StatusCode, body: &'static str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            body,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/ai/", post(mock_predict))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> Url {
        backend_url(self.addr)
    }

    pub fn requests(&self) -> Vec<Vec<RecordedPart>> {
        self.requests.lock().unwrap().clone()
    }
}

async fn mock_predict(State(state): State<MockState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        parts.push(RecordedPart {
            name: field.name().unwrap_or_default().to_string(),
            filename: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.unwrap().to_vec(),
        });
    }
    state.requests.lock().unwrap().push(parts);

    (state.status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], state.body)
}

/// A free local address with nothing listening on it.
pub fn reserve_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn backend_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}/ai/", addr)).unwrap()
}

/// A backend URL nothing is listening on.
pub fn unreachable_url() -> Url {
    backend_url(reserve_addr())
}

pub fn test_config(backend_url: Url) -> GatewayConfig {
    GatewayConfig {
        backend_url,
        backend_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        ..GatewayConfig::default()
    }
}

pub fn app(config: &GatewayConfig) -> Router {
    let state = AppState::from_config(config).unwrap();
    router(state, config)
}

pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn file_upload(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    upload_request(multipart_body("file", filename, content_type, data))
}

/// White digit-like stroke on black, the way the drawing canvas produces it.
pub fn digit_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x > width / 3 && x < 2 * width / 3 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

pub fn digit_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]));
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Jpeg)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

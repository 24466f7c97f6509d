//! HTTP round trips through the full router.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use image::Rgb;
use imagelab_ops::{RgbImage, codec};
use imagelab_server::router;
use imagelab_session::{ImageLab, LabSettings};
use tower::ServiceExt;

const BOUNDARY: &str = "imagelab-test-boundary";

fn app(dir: &Path, max_upload_bytes: usize) -> Router {
    let lab = ImageLab::open(&LabSettings {
        storage_dir: dir.to_path_buf(),
        max_upload_bytes,
        ..LabSettings::default()
    })
    .unwrap();
    router(Arc::new(lab))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    codec::encode_png(&RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))).unwrap()
}

fn upload_request(file_name: &str, bytes: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post("/upload").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn form_request(uri: &str, cookie: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .unwrap()
}

fn get_request(uri: &str, cookie: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Upload a small PNG and return the `name=value` cookie pair.
async fn start_session(app: &Router) -> String {
    let response = send(app, upload_request("photo.png", &png(64, 48), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_owned()
}

#[tokio::test]
async fn upload_process_undo_reset_clear() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20);
    let cookie = start_session(&app).await;

    let response = send(
        &app,
        form_request("/process", &cookie, "operation=resize&scale=50&angle=90"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = json(response).await;
    assert_eq!(view["operations"], serde_json::json!(["Resize (50%)"]));
    assert_eq!(view["can_undo"], true);

    let response = send(&app, form_request("/process", &cookie, "operation=negative")).await;
    assert_eq!(json(response).await["operations"].as_array().unwrap().len(), 2);

    let response = send(&app, form_request("/undo", &cookie, "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = json(response).await;
    assert_eq!(view["undone_operation"], "Negative");
    assert_eq!(view["operations"].as_array().unwrap().len(), 1);

    let response = send(&app, form_request("/reset", &cookie, "")).await;
    let view = json(response).await;
    assert_eq!(view["can_undo"], false);
    assert_eq!(view["current"], view["original"]);

    let response = send(&app, form_request("/clear", &cookie, "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let expired = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(expired.contains("Max-Age=0"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let response = send(&app, get_request("/session", &cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_errors_use_documented_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20);
    let cookie = start_session(&app).await;

    let response = send(&app, form_request("/undo", &cookie, "")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json(response).await["error"]["code"], "EMPTY_HISTORY");

    let response = send(&app, form_request("/process", &cookie, "operation=swirl")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"]["code"], "UNKNOWN_OPERATION");

    let response = send(
        &app,
        form_request("/process", &cookie, "operation=blur_gaussian&gaussian_kernel=4"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&app, form_request("/process", &cookie, "scale=50")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, form_request("/process", "other=1", "operation=negative")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 4096);

    let response = send(&app, upload_request("notes.txt", b"plain text", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key(header::SET_COOKIE));

    let response = send(&app, upload_request("broken.png", b"\x89PNG not really", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let big = vec![0u8; 8192];
    let response = send(&app, upload_request("big.png", &big, None)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn files_are_served_only_to_their_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20);
    let owner = start_session(&app).await;
    let stranger = start_session(&app).await;

    let view = json(send(&app, get_request("/session", &owner)).await).await;
    let preview_url = view["current"]["preview_url"].as_str().unwrap().to_owned();
    let download_url = view["download_url"].as_str().unwrap().to_owned();

    let response = send(&app, get_request(&preview_url, &owner)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");

    let response = send(&app, get_request(&download_url, &owner)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"orig-"));
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    assert_eq!(codec::decode(&bytes).unwrap().dimensions(), (64, 48));

    let response = send(&app, get_request(&preview_url, &stranger)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get_request("/files/..%2FCargo.toml", &owner)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_upload_replaces_the_cookie_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20);
    let first = start_session(&app).await;

    let response = send(&app, upload_request("next.png", &png(8, 8), Some(&first))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("/session", &first)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn convert_changes_the_downloaded_format() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20);
    let cookie = start_session(&app).await;

    // The page posts every control; only `format` matters here.
    let form = "operation=convert&format=jpg&scale=100&angle=0&brightness_value=0\
                &gaussian_kernel=5&median_kernel=5&sobel_ksize=3&sharpen_strength=1.0";
    let response = send(&app, form_request("/process", &cookie, form)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = json(response).await;
    assert_eq!(view["operations"], serde_json::json!(["Convert to JPG"]));
    let download_url = view["download_url"].as_str().unwrap().to_owned();
    assert!(download_url.ends_with(".jpg"));

    let response = send(&app, get_request(&download_url, &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    assert_eq!(
        imagelab_ops::ImageKind::detect(&bytes).unwrap(),
        imagelab_ops::ImageKind::Jpeg
    );

    let response = send(
        &app,
        form_request("/process", &cookie, "operation=convert&format=tiff"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

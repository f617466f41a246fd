// Integration tests for the HTTP surface: liveness endpoints, the fixed
// quality enumeration, and validation that rejects bad input before any
// yt-dlp invocation.

use std::io::Write;
use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use yt_downloader_api::config::AppConfig;
use yt_downloader_api::handlers;
use yt_downloader_api::state::AppState;

// yt-dlp points at a path that cannot exist, so any subprocess invocation
// fails immediately and deterministically instead of hitting the network.
fn test_state() -> web::Data<AppState> {
    let temp_root = std::env::temp_dir().join("yt-downloader-api-test");
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, r#"ytdlp_bin = "/nonexistent/yt-dlp""#).unwrap();
    writeln!(f, r#"temp_root = "{}""#, temp_root.display()).unwrap();
    let cfg = AppConfig::load(f.path()).unwrap();

    web::Data::new(AppState {
        limiter: Arc::new(Semaphore::new(cfg.max_concurrent_downloads)),
        config: Arc::new(cfg),
    })
}

async fn test_app(
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(test_state())
            .configure(handlers::routes),
    )
    .await
}

#[actix_web::test]
async fn index_describes_the_service() {
    let app = test_app().await;
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["service"], "YouTube Downloader API");
}

#[actix_web::test]
async fn health_reports_healthy() {
    let app = test_app().await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn qualities_enumerates_fixed_tiers() {
    let app = test_app().await;
    let req = test::TestRequest::get().uri("/qualities").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["mp3"].as_object().unwrap().len(), 4);
    assert_eq!(body["mp4"].as_object().unwrap().len(), 4);
    assert_eq!(body["mp3"]["low"], "96 kbps");
    assert_eq!(body["mp3"]["highest"], "320 kbps");
    assert_eq!(body["mp4"]["720p"], "HD 720p");
    assert_eq!(body["mp4"]["2160p"], "4K 2160p");
}

#[actix_web::test]
async fn download_rejects_unknown_format() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc", "format": "wav", "quality": "high"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("Invalid format"));
}

#[actix_web::test]
async fn download_rejects_quality_from_the_wrong_kind() {
    let app = test_app().await;

    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc", "format": "mp3", "quality": "1080p"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("audio quality"));

    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc", "format": "mp4", "quality": "medium"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("video quality"));
}

// The serde default for quality is "high", which is an audio tier; an mp4
// request that omits quality is therefore rejected before any tool call.
#[actix_web::test]
async fn download_default_quality_rejects_for_mp4() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc", "format": "mp4"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("video quality"));
}

#[actix_web::test]
async fn download_requires_a_url() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "  ", "format": "mp3", "quality": "high"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Missing url");
}

#[actix_web::test]
async fn inspect_requires_a_url() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/inspect")
        .set_json(json!({"url": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Missing url");
}

#[actix_web::test]
async fn inspect_surfaces_tool_failure_as_detail() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/inspect")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Failed to inspect video"));
}

#[actix_web::test]
async fn download_surfaces_tool_failure_as_detail() {
    let app = test_app().await;
    let req = test::TestRequest::post()
        .uri("/download")
        .set_json(json!({"url": "https://www.youtube.com/watch?v=abc", "format": "mp3", "quality": "high"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Failed to download"));
}

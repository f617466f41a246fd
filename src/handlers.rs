use std::path::PathBuf;
use std::time::Duration;

use actix_web::{web, HttpResponse, Responder};
use async_stream::stream;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::OwnedSemaphorePermit;

use crate::quality::{self, AudioQuality, OutputKind, VideoQuality};
use crate::state::AppState;
use crate::util;
use crate::ytdlp;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/qualities").route(web::get().to(qualities)))
        .service(web::resource("/inspect").route(web::post().to(inspect)))
        .service(web::resource("/download").route(web::post().to(download)))
        .service(web::resource("/health").route(web::get().to(health)));
}

#[derive(Deserialize)]
pub struct InspectRequest {
    pub url: String,
}

fn default_quality() -> String {
    "high".to_string()
}

#[derive(Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    // "mp3" or "mp4"
    pub format: String,
    // mp3: low|medium|high|highest; mp4: 720p|1080p|1440p|2160p
    #[serde(default = "default_quality")]
    pub quality: String,
}

#[derive(Serialize)]
struct FormatEntry {
    format_id: Option<String>,
    ext: Option<String>,
    resolution: String,
    height: Option<i64>,
    fps: Option<f64>,
    filesize: Option<i64>,
    tbr: Option<f64>,
    vbr: Option<f64>,
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "YouTube Downloader API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /qualities": "Supported quality tiers per output format",
            "POST /inspect": "List a video's available formats (body: {url})",
            "POST /download": "Download and return the media file (body: {url, format, quality})",
            "GET /health": "Liveness probe"
        }
    }))
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "message": "Service is up"
    }))
}

pub async fn qualities() -> impl Responder {
    let mp3: serde_json::Map<String, serde_json::Value> = AudioQuality::ALL
        .iter()
        .map(|q| (q.name().to_string(), q.label().into()))
        .collect();
    let mp4: serde_json::Map<String, serde_json::Value> = VideoQuality::ALL
        .iter()
        .map(|q| (q.name().to_string(), q.label().into()))
        .collect();
    HttpResponse::Ok().json(serde_json::json!({
        "mp3": mp3,
        "mp4": mp4
    }))
}

fn format_entry(f: &serde_json::Value) -> FormatEntry {
    let dim = |key: &str| {
        f.get(key)
            .and_then(|v| v.as_i64())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string())
    };
    FormatEntry {
        format_id: f.get("format_id").and_then(|v| v.as_str()).map(String::from),
        ext: f.get("ext").and_then(|v| v.as_str()).map(String::from),
        resolution: format!("{}x{}", dim("width"), dim("height")),
        height: f.get("height").and_then(|v| v.as_i64()),
        fps: f.get("fps").and_then(|v| v.as_f64()),
        filesize: f.get("filesize").and_then(|v| v.as_i64()),
        tbr: f.get("tbr").and_then(|v| v.as_f64()),
        vbr: f.get("vbr").and_then(|v| v.as_f64()),
    }
}

pub async fn inspect(req: web::Json<InspectRequest>, state: web::Data<AppState>) -> impl Responder {
    let url = req.url.clone();
    if url.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "detail": "Missing url"
        }));
    }

    let permit = match state.limiter.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            return HttpResponse::TooManyRequests().json(serde_json::json!({
                "detail": format!("Too many concurrent downloads (max: {})", state.config.max_concurrent_downloads)
            }));
        }
    };

    let clean_url = util::clean_video_url(&url);
    eprintln!("[INSPECT] Request: url={} clean={}", url, clean_url);

    // Keep the concurrency slot held while we run yt-dlp.
    let _permit: OwnedSemaphorePermit = permit;

    let info = match ytdlp::probe(state.config.as_ref(), &clean_url).await {
        Ok(v) => v,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "detail": format!("Failed to inspect video: {:#}", e)
            }));
        }
    };

    let mut formats: Vec<FormatEntry> = info
        .get("formats")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                // Only formats that carry a video stream.
                .filter(|f| f.get("vcodec").and_then(|v| v.as_str()) != Some("none"))
                .map(format_entry)
                .collect()
        })
        .unwrap_or_default();
    formats.sort_by_key(|f| std::cmp::Reverse(f.height.unwrap_or(0)));

    HttpResponse::Ok().json(serde_json::json!({
        "title": info.get("title").and_then(|v| v.as_str()).unwrap_or(""),
        "duration": info.get("duration").cloned().unwrap_or(serde_json::json!(0)),
        "formats": formats
    }))
}

fn schedule_cleanup(path: PathBuf, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = tokio::fs::remove_dir_all(&path).await {
            eprintln!("[CLEANUP] Failed to remove {}: {}", path.display(), e);
        }
    });
}

pub async fn download(req: web::Json<DownloadRequest>, state: web::Data<AppState>) -> impl Responder {
    let url = req.url.clone();
    if url.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "detail": "Missing url"
        }));
    }

    let kind = match OutputKind::parse(&req.format) {
        Some(k) => k,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "detail": "Invalid format (expected: mp3|mp4)"
            }));
        }
    };
    let quality = match quality::parse_quality(kind, &req.quality) {
        Some(q) => q,
        None => {
            let detail = match kind {
                OutputKind::Mp3 => "Invalid audio quality (expected: low|medium|high|highest)",
                OutputKind::Mp4 => "Invalid video quality (expected: 720p|1080p|1440p|2160p)",
            };
            return HttpResponse::BadRequest().json(serde_json::json!({
                "detail": detail
            }));
        }
    };

    let permit = match state.limiter.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            return HttpResponse::TooManyRequests().json(serde_json::json!({
                "detail": format!("Too many concurrent downloads (max: {})", state.config.max_concurrent_downloads)
            }));
        }
    };

    let cfg = state.config.as_ref();
    let clean_url = util::clean_video_url(&url);
    eprintln!(
        "[DOWNLOAD] Request: format={} quality={} url={} clean={}",
        req.format, req.quality, url, clean_url
    );

    if let Err(e) = tokio::fs::create_dir_all(&cfg.temp_root).await {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "detail": format!("Failed to create temp root: {}", e)
        }));
    }

    // Fresh random subdirectory per job; concurrent requests never share one.
    let temp_dir = match tempfile::Builder::new().prefix("job-").tempdir_in(&cfg.temp_root) {
        Ok(d) => d,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "detail": e.to_string()
            }));
        }
    };

    let job = ytdlp::DownloadJob {
        url: clean_url,
        kind,
        quality,
    };

    // On any failure below, dropping `temp_dir` removes the job directory
    // immediately; the delayed cleanup only takes over on success.
    let downloaded = match ytdlp::download(cfg, &job, temp_dir.path()).await {
        Ok(d) => d,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "detail": format!("Failed to download: {:#}", e)
            }));
        }
    };

    let mut file = match File::open(&downloaded.path).await {
        Ok(f) => f,
        Err(e) => {
            return HttpResponse::BadGateway().json(serde_json::json!({
                "detail": format!("Download succeeded but output file missing: {}", e)
            }));
        }
    };
    let meta = match file.metadata().await {
        Ok(m) => m,
        Err(e) => {
            return HttpResponse::BadGateway().json(serde_json::json!({
                "detail": format!("Failed to stat output file: {}", e)
            }));
        }
    };
    if meta.len() == 0 {
        return HttpResponse::BadGateway().json(serde_json::json!({
            "detail": "Download succeeded but output file is empty"
        }));
    }

    eprintln!(
        "[DOWNLOAD] Completed; streaming {} bytes as {}",
        meta.len(),
        downloaded.filename
    );

    // The response owns an already-open handle, so the delayed cleanup
    // deleting the directory does not interrupt an in-flight stream.
    let dir_path = temp_dir.keep();
    schedule_cleanup(dir_path, Duration::from_secs(cfg.cleanup_delay_secs));

    let body = stream! {
        let _permit: OwnedSemaphorePermit = permit;

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => yield Ok(bytes::Bytes::copy_from_slice(&buffer[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    HttpResponse::Ok()
        .content_type(kind.content_type())
        .append_header((actix_web::http::header::CONTENT_LENGTH, meta.len().to_string()))
        .append_header((
            actix_web::http::header::CONTENT_DISPOSITION,
            format!(r#"attachment; filename="{}""#, downloaded.filename),
        ))
        .append_header((actix_web::http::header::CACHE_CONTROL, "no-store"))
        .streaming(body)
}

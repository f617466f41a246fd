use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tokio::sync::Semaphore;

use yt_downloader_api::config::AppConfig;
use yt_downloader_api::handlers;
use yt_downloader_api::state::AppState;

fn build_cors(allowed_origins: &[String]) -> Cors {
    // An empty allowlist means a debug deployment: let any origin through.
    if allowed_origins.is_empty() {
        return Cors::permissive();
    }
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .max_age(3600);
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cfg_path = std::env::args()
        .skip_while(|a| a != "--config")
        .skip(1)
        .next()
        .unwrap_or_else(|| "config.toml".to_string());

    let cfg = match AppConfig::load(&cfg_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[CONFIG] Failed to load {}: {:#}", cfg_path, e);
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&cfg.temp_root)?;

    println!("========================================");
    println!("  YouTube Downloader API");
    println!("  http://{}", cfg.listen_addr);
    println!("========================================");
    println!();

    let state = web::Data::new(AppState {
        limiter: Arc::new(Semaphore::new(cfg.max_concurrent_downloads)),
        config: Arc::new(cfg),
    });

    let bind_addr = state.config.listen_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(build_cors(&state.config.allowed_origins))
            .app_data(state.clone())
            .configure(handlers::routes)
    })
    .bind(bind_addr.as_str())?
    .run()
    .await
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub max_concurrent_downloads: usize,

    // Per-request job directories are created under this root.
    pub temp_root: PathBuf,
    pub cleanup_delay_secs: u64,

    // Empty list means permissive CORS (debug deployments); otherwise a
    // strict origin allowlist.
    pub allowed_origins: Vec<String>,

    pub ytdlp_bin: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_bin: Option<PathBuf>,
    // Preferred: explicit yt-dlp proxy (e.g. socks5://127.0.0.1:7890).
    pub ytdlp_proxy: Option<String>,
    // Whether to let yt-dlp inherit http_proxy/https_proxy from the service environment.
    pub inherit_proxy_env: bool,
}

#[derive(Debug, Deserialize)]
struct AppConfigFile {
    listen_addr: Option<String>,
    max_concurrent_downloads: Option<usize>,

    temp_root: Option<String>,
    cleanup_delay_secs: Option<u64>,

    allowed_origins: Option<Vec<String>>,

    ytdlp_bin: Option<String>,
    ytdlp_path: Option<String>,
    ffmpeg_bin: Option<String>,
    ytdlp_proxy: Option<String>,
    inherit_proxy_env: Option<bool>,
}

fn default_ytdlp_path() -> String {
    // Prefer inheriting PATH from the service process; override via config.toml when needed
    // (e.g. to include Homebrew, ffmpeg, node from nvm, etc).
    std::env::var("PATH").unwrap_or_else(|_| {
        "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin".to_string()
    })
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file: {}",
                path.to_string_lossy().as_ref()
            )
        })?;

        let file: AppConfigFile = toml::from_str(&raw).context("Failed to parse config.toml")?;

        let cfg = Self {
            listen_addr: file.listen_addr.unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            max_concurrent_downloads: file.max_concurrent_downloads.unwrap_or(5),

            temp_root: PathBuf::from(file.temp_root.unwrap_or_else(|| "temp_downloads".to_string())),
            cleanup_delay_secs: file.cleanup_delay_secs.unwrap_or(5),

            allowed_origins: file
                .allowed_origins
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            ytdlp_bin: PathBuf::from(file.ytdlp_bin.unwrap_or_else(|| "yt-dlp".to_string())),
            ytdlp_path: file.ytdlp_path.unwrap_or_else(default_ytdlp_path),
            ffmpeg_bin: file.ffmpeg_bin.and_then(|s| {
                let s = s.trim().to_string();
                if s.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(s))
                }
            }),
            ytdlp_proxy: file
                .ytdlp_proxy
                .and_then(|s| {
                    let s = s.trim().to_string();
                    if s.is_empty() { None } else { Some(s) }
                }),
            inherit_proxy_env: file.inherit_proxy_env.unwrap_or(false),
        };

        Ok(cfg)
    }
}

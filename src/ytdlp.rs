//! yt-dlp subprocess orchestration: metadata probe, download, and output
//! filename reconciliation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::AppConfig;
use crate::quality::{OutputKind, Quality};
use crate::util;

pub struct DownloadJob {
    // Already cleaned by the caller.
    pub url: String,
    pub kind: OutputKind,
    pub quality: Quality,
}

pub struct DownloadedFile {
    pub path: PathBuf,
    pub filename: String,
}

async fn collect_stderr(
    stderr: tokio::process::ChildStderr,
    buf: Arc<AsyncMutex<VecDeque<String>>>,
) {
    let mut r = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match r.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let l = line.trim_end().to_string();
                if !l.is_empty() {
                    eprintln!("{}", l);
                    let mut g = buf.lock().await;
                    if g.len() >= 50 {
                        g.pop_front();
                    }
                    g.push_back(l);
                }
            }
            Err(_) => break,
        }
    }
}

async fn render_tail(buf: &AsyncMutex<VecDeque<String>>) -> String {
    let g = buf.lock().await;
    if g.is_empty() {
        return "no stderr output captured".to_string();
    }
    g.iter().cloned().collect::<Vec<_>>().join("\n")
}

fn find_ffmpeg(cfg: &AppConfig) -> Option<String> {
    if let Some(p) = &cfg.ffmpeg_bin {
        return Some(p.to_string_lossy().to_string());
    }
    // Common macOS/Homebrew locations.
    for p in ["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"] {
        if Path::new(p).exists() {
            return Some(p.to_string());
        }
    }
    None
}

fn build_base_command(cfg: &AppConfig) -> Command {
    let mut cmd = Command::new(&cfg.ytdlp_bin);
    cmd.env("PATH", &cfg.ytdlp_path);

    if !cfg.inherit_proxy_env {
        // Avoid being accidentally bound to a dead local proxy (common in shell env).
        cmd.env_remove("http_proxy")
            .env_remove("https_proxy")
            .env_remove("HTTP_PROXY")
            .env_remove("HTTPS_PROXY")
            .env_remove("no_proxy")
            .env_remove("NO_PROXY");
    }

    if let Some(p) = &cfg.ytdlp_proxy {
        cmd.arg("--proxy").arg(p);
    }

    cmd.arg("--no-playlist").arg("--no-cache-dir").arg("--no-part");

    cmd
}

/// Format-selection and postprocessing arguments for the requested tier.
/// ffmpeg location handling is separate because it depends on the host.
fn format_args(quality: Quality) -> Vec<String> {
    match quality {
        Quality::Audio(q) => vec![
            "-f".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            format!("{}K", q.bitrate_kbps()),
        ],
        Quality::Video(q) => vec!["-f".into(), q.selector().into()],
    }
}

/// Run `yt-dlp -J` and return the parsed metadata document.
pub async fn probe(cfg: &AppConfig, url: &str) -> Result<serde_json::Value> {
    let mut cmd = build_base_command(cfg);
    cmd.arg("-J")
        .arg(url)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let out = cmd.output().await.context("Failed to run yt-dlp")?;

    if !out.status.success() {
        let stderr_tail = String::from_utf8_lossy(&out.stderr);
        bail!(
            "yt-dlp exited with error (status={}): {}",
            out.status,
            stderr_tail.trim()
        );
    }

    serde_json::from_slice(&out.stdout).context("Failed to parse yt-dlp JSON")
}

/// Probe the video, then download it into `dir` under a sanitized title.
/// Returns the final file path and its client-facing filename.
pub async fn download(cfg: &AppConfig, job: &DownloadJob, dir: &Path) -> Result<DownloadedFile> {
    let info = probe(cfg, &job.url).await?;
    let title = info.get("title").and_then(|t| t.as_str()).unwrap_or("video");
    let stem = util::sanitize_filename(title);

    eprintln!("[DOWNLOAD] title={:?} stem={}", title, stem);

    let out_template = dir.join(format!("{}.%(ext)s", stem));

    let mut cmd = build_base_command(cfg);
    cmd.arg("-o").arg(out_template.to_string_lossy().as_ref());

    match job.quality {
        Quality::Audio(_) => {
            // mp3 extraction is an ffmpeg postprocessing step; refuse early
            // instead of letting yt-dlp fail halfway through.
            let ffmpeg = find_ffmpeg(cfg).ok_or_else(|| {
                anyhow!("ffmpeg is required for mp3 output. Install ffmpeg or set ffmpeg_bin in config.toml")
            })?;
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        Quality::Video(_) => {
            if let Some(ffmpeg) = find_ffmpeg(cfg) {
                cmd.arg("--ffmpeg-location").arg(ffmpeg);
                cmd.arg("--recode-video").arg("mp4");
            }
        }
    }

    for arg in format_args(job.quality) {
        cmd.arg(arg);
    }

    cmd.arg(&job.url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("Failed to start yt-dlp")?;
    if let Some(pid) = child.id() {
        eprintln!("[DOWNLOAD] yt-dlp started (pid={})", pid);
    }

    let tail_buf: Arc<AsyncMutex<VecDeque<String>>> = Arc::new(AsyncMutex::new(VecDeque::new()));
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("Failed to capture yt-dlp stderr"))?;
    let tail_buf_clone = tail_buf.clone();
    let stderr_task = tokio::spawn(async move { collect_stderr(stderr, tail_buf_clone).await });

    let status = child.wait().await.context("Failed waiting for yt-dlp")?;
    let _ = stderr_task.await;

    if !status.success() {
        let tail = render_tail(&tail_buf).await;
        bail!("yt-dlp exited with error (status={}): {}", status, tail);
    }

    let ext = job.kind.ext();
    let path = reconcile_output(dir, &stem, ext).await?;
    Ok(DownloadedFile {
        path,
        filename: format!("{}.{}", stem, ext),
    })
}

/// yt-dlp does not always produce exactly `<stem>.<ext>` (recode and merge
/// steps pick their own extensions). Settle on the expected name: take it if
/// present, otherwise rename a `<stem>.*` sibling, otherwise rename the
/// newest file in the job directory.
pub async fn reconcile_output(dir: &Path, stem: &str, ext: &str) -> Result<PathBuf> {
    let expected = dir.join(format!("{}.{}", stem, ext));
    if tokio::fs::metadata(&expected).await.is_ok() {
        return Ok(expected);
    }

    eprintln!(
        "[DOWNLOAD] Expected output missing: {}",
        expected.display()
    );

    let prefix = format!("{}.", stem);
    let mut sibling: Option<PathBuf> = None;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context("Failed to read job directory")?;
    while let Some(entry) = entries.next_entry().await.context("Failed to read job directory")? {
        let path = entry.path();
        let meta = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if sibling.is_none() && name.starts_with(&prefix) {
            sibling = Some(path.clone());
        }
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map(|(t, _)| mtime > *t).unwrap_or(true) {
            newest = Some((mtime, path));
        }
    }

    let found = sibling.or(newest.map(|(_, p)| p)).ok_or_else(|| {
        anyhow!("No downloaded file found in {}", dir.display())
    })?;

    eprintln!(
        "[DOWNLOAD] Renaming {} -> {}",
        found.display(),
        expected.display()
    );
    tokio::fs::rename(&found, &expected)
        .await
        .context("Failed to rename downloaded file")?;
    Ok(expected)
}

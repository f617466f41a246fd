use unicode_normalization::UnicodeNormalization;
use url::Url;

fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtu.be" || h == "youtube.com" || h.ends_with(".youtube.com")
}

/// Strip playlist/radio/share parameters from a video URL, keeping only the
/// video id. youtu.be short links are rewritten to the canonical watch URL.
/// Anything that is not a YouTube URL (or does not parse) passes through
/// unchanged.
pub fn clean_video_url(raw: &str) -> String {
    let parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };
    let host = match parsed.host_str() {
        Some(h) => h,
        None => return raw.to_string(),
    };
    if !is_youtube_host(host) {
        return raw.to_string();
    }

    if host.eq_ignore_ascii_case("youtu.be") {
        let id = parsed.path().trim_start_matches('/');
        return format!("https://www.youtube.com/watch?v={}", id);
    }

    let video_id = parsed
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned());

    let mut clean = parsed;
    clean.set_fragment(None);
    match video_id {
        Some(id) => {
            clean.query_pairs_mut().clear().append_pair("v", &id);
        }
        None => clean.set_query(None),
    }
    clean.to_string()
}

/// Reduce a media title to a safe filename stem: ASCII only, no filesystem
/// metacharacters, single underscores for whitespace, at most 100 chars.
/// Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    // NFKD first so accented letters decompose into a base char we can keep.
    let decomposed: String = name.nfkd().collect();

    let mut cleaned = String::with_capacity(decomposed.len());
    let mut prev_underscore = false;
    for c in decomposed.chars() {
        if !c.is_ascii() {
            continue;
        }
        let c = match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => continue,
            ' ' => '_',
            other => other,
        };
        if c == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        cleaned.push(c);
    }

    let trimmed = cleaned.trim_matches(|c| c == '_' || c == '-' || c == '.');
    if trimmed.is_empty() {
        return "video".to_string();
    }
    trimmed.chars().take(100).collect()
}

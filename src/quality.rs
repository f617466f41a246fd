//! Fixed output kinds and quality tiers, and their yt-dlp mappings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Mp3,
    Mp4,
}

impl OutputKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" => Some(Self::Mp3),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn ext(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Mp4 => "video/mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioQuality {
    Low,
    Medium,
    High,
    Highest,
}

impl AudioQuality {
    pub const ALL: [AudioQuality; 4] = [Self::Low, Self::Medium, Self::High, Self::Highest];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "highest" => Some(Self::Highest),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Highest => "highest",
        }
    }

    /// Target MP3 bitrate in kbps, passed to yt-dlp's audio postprocessor.
    pub fn bitrate_kbps(self) -> u32 {
        match self {
            Self::Low => 96,
            Self::Medium => 128,
            Self::High => 192,
            Self::Highest => 320,
        }
    }

    pub fn label(self) -> String {
        format!("{} kbps", self.bitrate_kbps())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    P720,
    P1080,
    P1440,
    P2160,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 4] = [Self::P720, Self::P1080, Self::P1440, Self::P2160];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "720p" => Some(Self::P720),
            "1080p" => Some(Self::P1080),
            "1440p" => Some(Self::P1440),
            "2160p" => Some(Self::P2160),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::P2160 => "2160p",
        }
    }

    /// yt-dlp format selector. The numeric fallbacks are YouTube's well-known
    /// format ids for each resolution (136/137 avc, 271/313 vp9, 400/401 av1).
    pub fn selector(self) -> &'static str {
        match self {
            Self::P720 => "best[height<=720][ext=mp4]/136/best[height<=720]",
            Self::P1080 => "best[height<=1080][height>=720][ext=mp4]/137/best[height<=1080]",
            Self::P1440 => "best[height<=1440][height>=1080][ext=mp4]/271/400/best[height<=1440]",
            Self::P2160 => "best[height<=2160][height>=1440][ext=mp4]/313/401/best[height<=2160]",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::P720 => "HD 720p",
            Self::P1080 => "Full HD 1080p",
            Self::P1440 => "2K 1440p",
            Self::P2160 => "4K 2160p",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Audio(AudioQuality),
    Video(VideoQuality),
}

/// Parse a quality tier for the given output kind. Audio tiers are only
/// valid for mp3 and resolution tiers only for mp4.
pub fn parse_quality(kind: OutputKind, s: &str) -> Option<Quality> {
    match kind {
        OutputKind::Mp3 => AudioQuality::parse(s).map(Quality::Audio),
        OutputKind::Mp4 => VideoQuality::parse(s).map(Quality::Video),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds_only() {
        assert_eq!(OutputKind::parse("mp3"), Some(OutputKind::Mp3));
        assert_eq!(OutputKind::parse("mp4"), Some(OutputKind::Mp4));
        assert_eq!(OutputKind::parse("wav"), None);
        assert_eq!(OutputKind::parse("MP3"), None);
    }

    #[test]
    fn audio_tiers_map_to_bitrates() {
        assert_eq!(AudioQuality::Low.bitrate_kbps(), 96);
        assert_eq!(AudioQuality::Medium.bitrate_kbps(), 128);
        assert_eq!(AudioQuality::High.bitrate_kbps(), 192);
        assert_eq!(AudioQuality::Highest.bitrate_kbps(), 320);
        assert_eq!(AudioQuality::Highest.label(), "320 kbps");
    }

    #[test]
    fn quality_is_scoped_to_kind() {
        assert!(parse_quality(OutputKind::Mp3, "high").is_some());
        assert!(parse_quality(OutputKind::Mp3, "1080p").is_none());
        assert!(parse_quality(OutputKind::Mp4, "1080p").is_some());
        assert!(parse_quality(OutputKind::Mp4, "high").is_none());
    }

    #[test]
    fn video_selectors_cap_height() {
        for q in VideoQuality::ALL {
            let cap = q.name().trim_end_matches('p');
            assert!(q.selector().contains(&format!("height<={}", cap)));
        }
    }
}

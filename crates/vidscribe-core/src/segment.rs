//! Transcript data model: timed segments, acquisition methods and results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-segment word timing, when the upstream source provides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    #[serde(rename = "startMs")]
    pub start_ms: u64,
}

/// One spoken unit of the transcript.
///
/// Within a normalized transcript, segments are offset-ordered and
/// non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Seconds from video start.
    pub offset: f64,
    /// Seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, offset: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            offset,
            duration,
            words: None,
        }
    }

    /// End of the segment in seconds from video start.
    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }
}

/// How a transcript was obtained.
///
/// Drives cache TTL selection and is surfaced to callers as provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMethod {
    /// Caption track scraped from the watch page.
    CaptionScrape,
    /// Caption track located through the player metadata API.
    PlayerApi,
    /// Relay endpoint used from constrained hosting environments.
    Relay,
    /// Caption track located by shelling out to yt-dlp.
    Ytdlp,
    /// Deepgram speech-to-text.
    Deepgram,
    /// Groq Whisper speech-to-text.
    Groq,
    /// Self-hosted whisper service.
    LocalWhisper,
    /// Served from the transcript cache.
    Cache,
}

impl AcquisitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptionScrape => "caption-scrape",
            Self::PlayerApi => "player-api",
            Self::Relay => "relay",
            Self::Ytdlp => "yt-dlp",
            Self::Deepgram => "deepgram",
            Self::Groq => "groq",
            Self::LocalWhisper => "local-whisper",
            Self::Cache => "cache",
        }
    }

    /// Whether this method paid for speech-to-text (as opposed to reusing
    /// captions that already existed upstream).
    pub fn is_stt(&self) -> bool {
        matches!(self, Self::Deepgram | Self::Groq | Self::LocalWhisper)
    }

    /// Cache retention for entries originally produced by this method.
    ///
    /// Captions can be corrected upstream, so they age out in a day.
    /// Speech-to-text output costs real money to regenerate and is kept
    /// for a month.
    pub fn cache_ttl(&self) -> chrono::Duration {
        if self.is_stt() {
            chrono::Duration::days(30)
        } else {
            chrono::Duration::hours(24)
        }
    }
}

impl fmt::Display for AcquisitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AcquisitionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "caption-scrape" => Ok(Self::CaptionScrape),
            "player-api" => Ok(Self::PlayerApi),
            "relay" => Ok(Self::Relay),
            "yt-dlp" | "ytdlp" => Ok(Self::Ytdlp),
            "deepgram" => Ok(Self::Deepgram),
            "groq" => Ok(Self::Groq),
            "local-whisper" | "localwhisper" => Ok(Self::LocalWhisper),
            "cache" => Ok(Self::Cache),
            _ => Err(format!("unknown acquisition method: {s}")),
        }
    }
}

/// A successful acquisition: the segments plus the method that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub segments: Vec<TranscriptSegment>,
    pub source: AcquisitionMethod,
}

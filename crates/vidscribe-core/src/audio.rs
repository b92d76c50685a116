//! Audio acquisition for the fallback cascade.
//!
//! Every source hands back an in-memory buffer that has already passed
//! the origin guard (where the URL came from upstream metadata) and the
//! byte cap, so transcription providers never see unvalidated input.

use std::time::Duration;

use async_trait::async_trait;

use crate::download::fetch_bounded;
use crate::error::{PipelineError, PipelineResult};
use crate::guard;
use crate::strategy::player_metadata;

/// Downloads below this size are treated as failed: they are error pages
/// or truncated streams, not audio.
const MIN_AUDIO_BYTES: usize = 1000;

const AUDIO_FETCH_BUDGET: Duration = Duration::from_secs(60);

/// One way of obtaining raw audio for a video.
#[async_trait]
pub trait AudioSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<u8>>;
}

fn ensure_plausible(audio: Vec<u8>) -> PipelineResult<Vec<u8>> {
    if audio.len() < MIN_AUDIO_BYTES {
        return Err(PipelineError::Parse(format!(
            "audio too small ({} bytes)",
            audio.len()
        )));
    }
    Ok(audio)
}

/// Audio via the operator relay (constrained environments).
pub struct RelayAudio {
    base_url: String,
    max_bytes: u64,
}

impl RelayAudio {
    pub fn new(base_url: String, max_bytes: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }
}

#[async_trait]
impl AudioSource for RelayAudio {
    fn name(&self) -> &'static str {
        "relay-audio"
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<u8>> {
        let url = format!("{}/audio?video_id={video_id}", self.base_url);
        let url = url::Url::parse(&url)
            .map_err(|_| PipelineError::Parse("invalid relay url".to_string()))?;
        let audio = fetch_bounded(client, url, self.max_bytes, AUDIO_FETCH_BUDGET).await?;
        ensure_plausible(audio)
    }
}

/// Audio streamed straight from the origin, located through player
/// metadata. Picks the lowest-bitrate audio format: transcription quality
/// does not need more and the buffer is re-uploaded to an STT provider.
pub struct DirectAudio {
    max_bytes: u64,
}

impl DirectAudio {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl AudioSource for DirectAudio {
    fn name(&self) -> &'static str {
        "direct-audio"
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<u8>> {
        let metadata = player_metadata(client, video_id).await?;
        let formats = metadata
            .streaming_data
            .map(|s| s.adaptive_formats)
            .unwrap_or_default();

        let stream_url = formats
            .iter()
            .filter(|f| f.mime_type.starts_with("audio/"))
            .min_by_key(|f| f.bitrate.unwrap_or(u64::MAX))
            .and_then(|f| f.url.as_deref())
            .ok_or_else(|| PipelineError::Parse("no audio stream in metadata".to_string()))?;

        let stream_url = guard::ensure_allowed(stream_url)?;
        let audio = fetch_bounded(client, stream_url, self.max_bytes, AUDIO_FETCH_BUDGET).await?;
        ensure_plausible(audio)
    }
}

/// Audio via yt-dlp writing to stdout.
pub struct YtdlpAudio {
    bin: String,
    max_bytes: u64,
}

impl YtdlpAudio {
    pub fn new(bin: String, max_bytes: u64) -> Self {
        Self { bin, max_bytes }
    }
}

#[async_trait]
impl AudioSource for YtdlpAudio {
    fn name(&self) -> &'static str {
        "ytdlp-audio"
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<u8>> {
        let _ = client;
        let audio = crate::strategy::run_ytdlp(
            &self.bin,
            &[
                "-f",
                "bestaudio[ext=webm]/bestaudio",
                "--no-playlist",
                "--no-warnings",
                "-o",
                "-",
                &crate::strategy::watch_url(video_id),
            ],
        )
        .await?;

        if audio.len() as u64 > self.max_bytes {
            return Err(PipelineError::SizeExceeded {
                cap: self.max_bytes,
            });
        }
        ensure_plausible(audio)
    }
}

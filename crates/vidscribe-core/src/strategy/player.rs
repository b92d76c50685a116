//! Caption strategy: the player metadata API.
//!
//! The innertube player endpoint returns structured metadata including
//! the caption track list and adaptive media formats. The metadata fetch
//! is shared with the audio cascade (`player_metadata`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::download::fetch_bounded;
use crate::error::{PipelineError, PipelineResult};
use crate::guard;
use crate::parser::parse_caption_payload;
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::{pick_track, CaptionStrategy, CaptionTrack};

const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const TRACK_FETCH_BUDGET: Duration = Duration::from_secs(10);

// An Android client context sidesteps the web client's signature
// requirements on media URLs.
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "19.09.37";

#[derive(Debug, Deserialize)]
pub(crate) struct PlayerResponse {
    pub captions: Option<Captions>,
    #[serde(rename = "streamingData")]
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    pub tracklist: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TracklistRenderer {
    #[serde(rename = "captionTracks", default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamingData {
    #[serde(rename = "adaptiveFormats", default)]
    pub adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdaptiveFormat {
    pub url: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    pub bitrate: Option<u64>,
}

/// Fetch player metadata for a video. Also used by the audio cascade to
/// locate direct audio-stream URLs.
pub(crate) async fn player_metadata(
    client: &reqwest::Client,
    video_id: &str,
) -> PipelineResult<PlayerResponse> {
    let body = json!({
        "context": {
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "hl": "en",
            }
        },
        "videoId": video_id,
    });

    let response = client.post(PLAYER_URL).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Upstream {
            status: status.as_u16(),
            detail: "player api request rejected".to_string(),
        });
    }

    Ok(response.json::<PlayerResponse>().await?)
}

pub struct PlayerApiStrategy {
    max_caption_bytes: u64,
}

impl PlayerApiStrategy {
    pub fn new(max_caption_bytes: u64) -> Self {
        Self { max_caption_bytes }
    }
}

#[async_trait]
impl CaptionStrategy for PlayerApiStrategy {
    fn name(&self) -> &'static str {
        "player-api"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::PlayerApi
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let metadata = player_metadata(client, video_id).await?;
        let tracks = metadata
            .captions
            .and_then(|c| c.tracklist)
            .map(|t| t.caption_tracks)
            .unwrap_or_default();

        let track = pick_track(&tracks).ok_or(PipelineError::EmptyTranscript)?;
        let base_url = track
            .base_url
            .as_deref()
            .ok_or_else(|| PipelineError::Parse("caption track has no url".to_string()))?;

        let track_url = guard::ensure_allowed(&format!("{base_url}&fmt=json3"))?;
        let payload =
            fetch_bounded(client, track_url, self.max_caption_bytes, TRACK_FETCH_BUDGET).await?;
        parse_caption_payload(&payload)
    }
}

//! Caption strategy: scrape the watch page for its caption track list.
//!
//! The watch page embeds player metadata as inline JSON. The
//! `captionTracks` array is cut out with a balanced-bracket scan (the
//! page is far too large and irregular to parse wholesale) and the chosen
//! track is fetched through the origin guard and bounded downloader.

use async_trait::async_trait;
use std::time::Duration;

use crate::download::fetch_bounded;
use crate::error::{PipelineError, PipelineResult};
use crate::guard;
use crate::parser::parse_caption_payload;
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::{pick_track, CaptionStrategy, CaptionTrack};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const TRACK_FETCH_BUDGET: Duration = Duration::from_secs(10);

pub struct CaptionScrapeStrategy {
    max_caption_bytes: u64,
}

impl CaptionScrapeStrategy {
    pub fn new(max_caption_bytes: u64) -> Self {
        Self { max_caption_bytes }
    }
}

#[async_trait]
impl CaptionStrategy for CaptionScrapeStrategy {
    fn name(&self) -> &'static str {
        "caption-scrape"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::CaptionScrape
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let response = client
            .get(WATCH_URL)
            .query(&[("v", video_id), ("hl", "en")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Upstream {
                status: status.as_u16(),
                detail: "watch page request rejected".to_string(),
            });
        }
        let page = response.text().await?;

        let raw_tracks = extract_json_array(&page, "\"captionTracks\":").ok_or_else(|| {
            PipelineError::Parse("no caption tracks on watch page".to_string())
        })?;
        let tracks: Vec<CaptionTrack> = serde_json::from_str(raw_tracks)?;

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

/// Slice the JSON array that follows `key` out of `haystack`, honoring
/// string literals and escapes while balancing brackets.
fn extract_json_array<'a>(haystack: &'a str, key: &str) -> Option<&'a str> {
    let key_pos = haystack.find(key)?;
    let after_key = &haystack[key_pos + key.len()..];
    let open = after_key.find('[')?;

    let bytes = after_key.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after_key[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

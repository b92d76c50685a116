//! Caption strategy: yt-dlp metadata extraction.
//!
//! Shells out to yt-dlp for a metadata dump, picks an English json3
//! subtitle URL out of it, then fetches the track through the origin
//! guard and bounded downloader like every other strategy. Only built on
//! hosts where process spawning is permitted.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::download::fetch_bounded;
use crate::error::{PipelineError, PipelineResult};
use crate::guard;
use crate::parser::parse_caption_payload;
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::CaptionStrategy;

const TRACK_FETCH_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct DumpJson {
    #[serde(default)]
    subtitles: HashMap<String, Vec<SubtitleFormat>>,
    #[serde(default)]
    automatic_captions: HashMap<String, Vec<SubtitleFormat>>,
}

#[derive(Debug, Deserialize)]
struct SubtitleFormat {
    url: Option<String>,
    ext: Option<String>,
}

pub struct YtdlpCaptionStrategy {
    bin: String,
    max_caption_bytes: u64,
}

impl YtdlpCaptionStrategy {
    pub fn new(bin: String, max_caption_bytes: u64) -> Self {
        Self {
            bin,
            max_caption_bytes,
        }
    }
}

#[async_trait]
impl CaptionStrategy for YtdlpCaptionStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::Ytdlp
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let stdout = run_ytdlp(
            &self.bin,
            &[
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
                &watch_url(video_id),
            ],
        )
        .await?;

        let dump: DumpJson = serde_json::from_slice(&stdout)?;
        let url = pick_subtitle_url(&dump).ok_or(PipelineError::EmptyTranscript)?;

        let track_url = guard::ensure_allowed(url)?;
        let payload =
            fetch_bounded(client, track_url, self.max_caption_bytes, TRACK_FETCH_BUDGET).await?;
        parse_caption_payload(&payload)
    }
}

pub(crate) fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Run yt-dlp and capture stdout. The child is killed if the owning
/// future is dropped, so a lost race does not leave the process running
/// past the pipeline deadline with no consumer.
pub(crate) async fn run_ytdlp(bin: &str, args: &[&str]) -> PipelineResult<Vec<u8>> {
    let output = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::Unavailable(format!("`{bin}` not found on PATH"))
            } else {
                PipelineError::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Command {
            command: bin.to_string(),
            detail: stderr.chars().take(300).collect(),
        });
    }

    Ok(output.stdout)
}

/// Prefer uploaded subtitles over automatic captions, English first,
/// json3 where available.
fn pick_subtitle_url(dump: &DumpJson) -> Option<&str> {
    pick_from_map(&dump.subtitles).or_else(|| pick_from_map(&dump.automatic_captions))
}

fn pick_from_map(map: &HashMap<String, Vec<SubtitleFormat>>) -> Option<&str> {
    let mut languages: Vec<&String> = map.keys().collect();
    languages.sort();

    let english = languages
        .iter()
        .find(|lang| lang.starts_with("en"))
        .or_else(|| languages.first())?;

    let formats = &map[*english];
    formats
        .iter()
        .find(|f| f.ext.as_deref() == Some("json3"))
        .or_else(|| formats.first())
        .and_then(|f| f.url.as_deref())
}

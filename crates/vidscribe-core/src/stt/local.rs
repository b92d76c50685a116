//! Self-hosted whisper service provider.
//!
//! The last-resort transcription path: a whisper service running on
//! operator infrastructure (no per-call cost, no external key). Audio is
//! uploaded as a multipart form; the service answers in the canonical
//! segment schema.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::SpeechToText;

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

pub struct LocalWhisperStt {
    base_url: String,
}

impl LocalWhisperStt {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SpeechToText for LocalWhisperStt {
    fn name(&self) -> &'static str {
        "local-whisper"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::LocalWhisper
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio: Vec<u8>,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(audio)
                .file_name("audio.webm")
                .mime_str("application/octet-stream")?,
        );

        let response = client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upstream {
                status: status.as_u16(),
                detail: detail.chars().take(300).collect(),
            });
        }

        let body: ServiceResponse = response.json().await?;
        Ok(body.segments)
    }
}

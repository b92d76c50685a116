//! Groq Whisper speech-to-text provider.
//!
//! OpenAI-compatible transcription API: multipart form upload with
//! `model` and `file` fields, bearer auth, `verbose_json` response with
//! per-segment timing.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::SpeechToText;

const API_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const MODEL: &str = "whisper-large-v3-turbo";

#[derive(Debug, Deserialize)]
struct VerboseJsonResponse {
    text: String,
    #[serde(default)]
    segments: Vec<VerboseJsonSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseJsonSegment {
    start: f64,
    end: f64,
    text: String,
}

pub struct GroqStt {
    api_key: String,
}

impl GroqStt {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl SpeechToText for GroqStt {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::Groq
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio: Vec<u8>,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let form = reqwest::multipart::Form::new()
            .text("model", MODEL)
            .text("response_format", "verbose_json")
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.webm")
                    .mime_str("application/octet-stream")?,
            );

        let response = client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let body: VerboseJsonResponse = response.json().await?;
        Ok(into_segments(body))
    }
}

fn into_segments(response: VerboseJsonResponse) -> Vec<TranscriptSegment> {
    if response.segments.is_empty() {
        let text = response.text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        return vec![TranscriptSegment::new(text.to_string(), 0.0, 0.0)];
    }

    response
        .segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| TranscriptSegment::new(s.text.trim().to_string(), s.start, s.end - s.start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_json_segments_become_timed_segments() {
        let raw = r#"{"text": "hello world again",
          "segments": [
            {"id": 0, "start": 0.0, "end": 2.0, "text": " hello world"},
            {"id": 1, "start": 2.0, "end": 3.5, "text": " again"}
        ]}"#;
        let parsed: VerboseJsonResponse = serde_json::from_str(raw).unwrap();
        let segments = into_segments(parsed);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello world");
        assert!((segments[1].offset - 2.0).abs() < 1e-9);
    }

    #[test]
    fn plain_text_response_becomes_one_segment() {
        let parsed: VerboseJsonResponse =
            serde_json::from_str(r#"{"text": "just text"}"#).unwrap();
        let segments = into_segments(parsed);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just text");
    }
}

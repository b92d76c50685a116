//! Deepgram speech-to-text provider.
//!
//! Raw audio is posted to the prerecorded listen endpoint with utterance
//! grouping enabled; utterances map directly onto transcript segments
//! with word-level timing.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, TranscriptSegment, WordTiming};

use super::SpeechToText;

const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";
const MODEL: &str = "nova-2";

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    utterances: Vec<Utterance>,
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Utterance {
    start: f64,
    end: f64,
    transcript: String,
    #[serde(default)]
    words: Vec<DeepgramWord>,
}

#[derive(Debug, Deserialize)]
struct DeepgramWord {
    word: String,
    start: f64,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

pub struct DeepgramStt {
    api_key: String,
}

impl DeepgramStt {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::Deepgram
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio: Vec<u8>,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let response = client
            .post(LISTEN_URL)
            .query(&[
                ("model", MODEL),
                ("smart_format", "true"),
                ("utterances", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio)
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

        let body: ListenResponse = response.json().await?;
        Ok(into_segments(body))
    }
}

fn into_segments(response: ListenResponse) -> Vec<TranscriptSegment> {
    let Some(results) = response.results else {
        return Vec::new();
    };

    if !results.utterances.is_empty() {
        return results
            .utterances
            .into_iter()
            .filter(|u| !u.transcript.trim().is_empty())
            .map(|u| {
                let words: Vec<WordTiming> = u
                    .words
                    .into_iter()
                    .map(|w| WordTiming {
                        text: w.word,
                        start_ms: (w.start * 1000.0) as u64,
                    })
                    .collect();
                TranscriptSegment {
                    text: u.transcript.trim().to_string(),
                    offset: u.start,
                    duration: u.end - u.start,
                    words: (!words.is_empty()).then_some(words),
                }
            })
            .collect();
    }

    // No utterance grouping in the response: fall back to the whole-channel
    // transcript as a single untimed segment.
    results
        .channels
        .into_iter()
        .flat_map(|c| c.alternatives)
        .filter(|a| !a.transcript.trim().is_empty())
        .take(1)
        .map(|a| TranscriptSegment::new(a.transcript.trim().to_string(), 0.0, 0.0))
        .collect()
}

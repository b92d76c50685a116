//! Parser for the json3 caption dialect.
//!
//! Events carry a start and duration in milliseconds plus a list of text
//! runs (`segs`), each optionally offset within the event. Append-mode
//! events repeat the text of the previous window for rolling-caption
//! display and are skipped outright.

use serde::Deserialize;

use crate::error::PipelineResult;
use crate::segment::{TranscriptSegment, WordTiming};

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs")]
    start_ms: Option<u64>,
    #[serde(rename = "dDurationMs")]
    duration_ms: Option<u64>,
    #[serde(rename = "aAppend")]
    append: Option<i64>,
    #[serde(default)]
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    utf8: Option<String>,
    #[serde(rename = "tOffsetMs")]
    offset_ms: Option<u64>,
}

/// Decode a json3 document into raw segments with word-level timing.
pub fn parse_json3(document: &str) -> PipelineResult<Vec<TranscriptSegment>> {
    let parsed: Json3Document = serde_json::from_str(document)?;

    let segments = parsed
        .events
        .into_iter()
        .filter(|event| event.append != Some(1))
        .filter_map(|event| {
            let start_ms = event.start_ms?;
            let segs = event.segs?;

            let mut words = Vec::new();
            for seg in &segs {
                let Some(text) = seg.utf8.as_deref() else {
                    continue;
                };
                let word = text.trim();
                if word.is_empty() {
                    continue;
                }
                words.push(WordTiming {
                    text: word.to_string(),
                    start_ms: start_ms + seg.offset_ms.unwrap_or(0),
                });
            }

            let text = words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                return None;
            }

            Some(TranscriptSegment {
                text,
                offset: start_ms as f64 / 1000.0,
                duration: event.duration_ms.unwrap_or(0) as f64 / 1000.0,
                words: Some(words),
            })
        })
        .collect();

    Ok(segments)
}

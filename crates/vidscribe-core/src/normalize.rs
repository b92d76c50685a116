//! Segment normalizer: artifact stripping, deduplication and sentence
//! merging.
//!
//! Upstream captions arrive as noisy sub-second fragments: stage
//! directions in brackets, musical-note glyphs, speaker labels, rolling
//! duplicates from auto-caption windows. This module cleans them into
//! sentence-scale segments. The merge step is idempotent: once gaps and
//! lengths no longer trigger a split, re-running it is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::segment::{TranscriptSegment, WordTiming};

/// Fragments separated by more than this many seconds never merge.
const MERGE_GAP_SECS: f64 = 3.0;
/// Soft cap on merged segment text length.
const SOFT_LENGTH_CAP: usize = 150;
/// A buffer ending in sentence punctuation flushes only past this length,
/// which keeps abbreviations and short clauses from splitting early.
const MIN_SENTENCE_LEN: usize = 30;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static MUSIC_GLYPHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{266a}\u{266b}\u{266c}]").unwrap());
static SPEAKER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9 .'-]{1,24}:\s*").unwrap());
static LEADING_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[>-]+\s*)+").unwrap());

/// Full normalization pass: strip, dedup, merge, then restore the
/// ordered/non-overlapping invariant.
pub fn normalize(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let mut cleaned = strip_artifacts(segments);
    cleaned.sort_by(|a, b| a.offset.partial_cmp(&b.offset).unwrap_or(std::cmp::Ordering::Equal));
    let deduped = dedup(cleaned);
    let mut merged = merge_sentences(deduped);
    clamp_overlaps(&mut merged);
    merged
}

/// Remove annotation artifacts from every segment, dropping segments that
/// end up empty.
pub fn strip_artifacts(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter_map(|mut segment| {
            let text = clean_text(&segment.text);
            if text.is_empty() {
                return None;
            }
            segment.text = text;
            Some(segment)
        })
        .collect()
}

fn clean_text(raw: &str) -> String {
    let text = BRACKETED.replace_all(raw, " ");
    let text = MUSIC_GLYPHS.replace_all(&text, " ");
    let trimmed = text.trim();
    let text = LEADING_MARKERS.replace(trimmed, "");
    let text = SPEAKER_PREFIX.replace(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop rolling-caption duplicates: consecutive identical segments, and
/// time-overlapping segments whose text is fully contained in a neighbor.
pub fn dedup(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let mut out: Vec<TranscriptSegment> = Vec::with_capacity(segments.len());

    for segment in segments {
        if let Some(prev) = out.last_mut() {
            if prev.text == segment.text {
                continue;
            }
            let overlaps = segment.offset < prev.end();
            if overlaps && prev.text.contains(&segment.text) {
                continue;
            }
            if overlaps && segment.text.contains(&prev.text) {
                *prev = segment;
                continue;
            }
        }
        out.push(segment);
    }

    out
}

/// Accumulate fragments into sentence-scale segments.
pub fn merge_sentences(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let mut out: Vec<TranscriptSegment> = Vec::new();
    let mut buffer: Option<TranscriptSegment> = None;

    for fragment in segments {
        let Some(mut current) = buffer.take() else {
            buffer = Some(fragment);
            continue;
        };

        let gap = fragment.offset - current.end();
        if gap > MERGE_GAP_SECS
            || current.text.len() >= SOFT_LENGTH_CAP
            || (ends_sentence(&current.text) && current.text.len() >= MIN_SENTENCE_LEN)
        {
            out.push(current);
            buffer = Some(fragment);
            continue;
        }

        current.text.push(' ');
        current.text.push_str(&fragment.text);
        current.duration = fragment.end() - current.offset;
        current.words = concat_words(current.words.take(), fragment.words);
        buffer = Some(current);
    }

    if let Some(last) = buffer {
        out.push(last);
    }
    out
}

fn ends_sentence(text: &str) -> bool {
    matches!(
        text.chars().last(),
        Some('.') | Some('!') | Some('?') | Some('\u{2026}')
    )
}

fn concat_words(
    left: Option<Vec<WordTiming>>,
    right: Option<Vec<WordTiming>>,
) -> Option<Vec<WordTiming>> {
    match (left, right) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Enforce the non-overlap invariant by shortening any segment that runs
/// past the start of the next one.
fn clamp_overlaps(segments: &mut [TranscriptSegment]) {
    for i in 1..segments.len() {
        let next_offset = segments[i].offset;
        let prev = &mut segments[i - 1];
        if prev.end() > next_offset {
            prev.duration = (next_offset - prev.offset).max(0.0);
        }
    }
}

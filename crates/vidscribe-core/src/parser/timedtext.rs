//! Parser for the timedtext XML caption dialect.
//!
//! The format is a flat list of `<text start=".." dur="..">body</text>`
//! elements. Bodies carry HTML entities and occasional inline markup,
//! both of which are stripped here; structural cleanup (dedup, sentence
//! merging) happens later in the normalizer.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::segment::TranscriptSegment;

static TEXT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<text\s+([^>]*)>(.*?)</text>").unwrap());
static START_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"start="([0-9.]+)""#).unwrap());
static DUR_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"dur="([0-9.]+)""#).unwrap());
static INLINE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(x?[0-9a-fA-F]+);").unwrap());

/// Decode a timedtext document into raw segments. Elements with empty
/// bodies are dropped; a missing `dur` attribute becomes zero.
pub fn parse_timedtext(document: &str) -> Vec<TranscriptSegment> {
    TEXT_ELEMENT
        .captures_iter(document)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str();

            let offset = START_ATTR
                .captures(attrs)
                .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())?;
            let duration = DUR_ATTR
                .captures(attrs)
                .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);

            let text = decode_entities(&INLINE_TAG.replace_all(body, " "));
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }

            Some(TranscriptSegment::new(text, offset, duration))
        })
        .collect()
}

/// Resolve numeric and the common named HTML entities. Caption bodies are
/// frequently double-encoded (`&amp;#39;`), so named entities are decoded
/// after numeric ones and `&amp;` last of all.
fn decode_entities(input: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(input, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let parsed = if let Some(hex) = raw.strip_prefix('x').or_else(|| raw.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            raw.parse::<u32>().ok()
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

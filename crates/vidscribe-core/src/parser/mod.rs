//! Format parsers: decode upstream caption wire formats into segments.

mod json3;
mod timedtext;

pub use json3::parse_json3;
pub use timedtext::parse_timedtext;

use crate::error::{PipelineError, PipelineResult};
use crate::segment::TranscriptSegment;

/// Decode a caption payload, sniffing between the JSON dialect and the
/// timedtext XML dialect.
pub fn parse_caption_payload(payload: &[u8]) -> PipelineResult<Vec<TranscriptSegment>> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| PipelineError::Parse("caption payload is not valid utf-8".into()))?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('{') {
        parse_json3(trimmed)
    } else if trimmed.starts_with('<') {
        Ok(parse_timedtext(trimmed))
    } else {
        Err(PipelineError::Parse(
            "unrecognized caption payload format".into(),
        ))
    }
}

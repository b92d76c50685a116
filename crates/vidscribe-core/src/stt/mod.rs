//! Speech-to-text providers for the fallback cascade.

mod deepgram;
mod groq;
mod local;

pub use deepgram::DeepgramStt;
pub use groq::GroqStt;
pub use local::LocalWhisperStt;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::segment::{AcquisitionMethod, TranscriptSegment};

/// One speech-to-text provider. Receives a downloaded (already validated
/// and size-bounded) audio buffer and returns timed segments.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provenance tag applied when this provider produces the result.
    fn method(&self) -> AcquisitionMethod;

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        audio: Vec<u8>,
    ) -> PipelineResult<Vec<TranscriptSegment>>;
}

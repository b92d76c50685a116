//! Caption acquisition strategies.
//!
//! Each strategy wraps one concrete way of obtaining a caption track.
//! Strategies are independent and stateless per invocation; which ones
//! are even constructed is a capability-detection step over the config,
//! so the race and cascade stay free of environment conditionals.

mod player;
mod relay;
mod scrape;
mod ytdlp;

pub use player::PlayerApiStrategy;
pub use relay::RelayStrategy;
pub use scrape::CaptionScrapeStrategy;
pub use ytdlp::YtdlpCaptionStrategy;

pub(crate) use player::player_metadata;
pub(crate) use ytdlp::{run_ytdlp, watch_url};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::segment::{AcquisitionMethod, TranscriptSegment};

/// One concrete method of obtaining a caption transcript.
#[async_trait]
pub trait CaptionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provenance tag applied when this strategy wins the race.
    fn method(&self) -> AcquisitionMethod;

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>>;
}

/// Declarative wrapper pairing a strategy with its retry/timeout policy.
#[derive(Clone)]
pub struct StrategyDescriptor {
    pub strategy: Arc<dyn CaptionStrategy>,
    /// Budget for the whole strategy run, retries included.
    pub timeout: Duration,
    /// Retry attempts beyond the first.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl StrategyDescriptor {
    pub fn new(strategy: Arc<dyn CaptionStrategy>, config: &PipelineConfig) -> Self {
        Self {
            strategy,
            timeout: config.timeouts.strategy,
            retries: config.strategy_retries,
            retry_delay: config.timeouts.retry_delay,
        }
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }
}

/// Build the caption strategy set available in the current environment.
///
/// Constrained hosts get the relay prepended because the primary egress
/// path is blocked there; yt-dlp joins only where process spawning is
/// permitted.
pub fn caption_strategies(config: &PipelineConfig) -> Vec<StrategyDescriptor> {
    let mut strategies: Vec<Arc<dyn CaptionStrategy>> = Vec::new();

    if config.constrained {
        if let Some(relay_url) = &config.relay_url {
            strategies.push(Arc::new(RelayStrategy::new(relay_url.clone())));
        }
    }

    strategies.push(Arc::new(CaptionScrapeStrategy::new(
        config.max_caption_bytes,
    )));
    strategies.push(Arc::new(PlayerApiStrategy::new(config.max_caption_bytes)));

    if config.can_spawn() {
        strategies.push(Arc::new(YtdlpCaptionStrategy::new(
            config.ytdlp_path.clone(),
            config.max_caption_bytes,
        )));
    }

    strategies
        .into_iter()
        .map(|s| StrategyDescriptor::new(s, config))
        .collect()
}

/// A caption track advertised in upstream metadata.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "languageCode")]
    pub language_code: Option<String>,
    /// `"asr"` marks machine-generated tracks.
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_english(&self) -> bool {
        self.language_code
            .as_deref()
            .is_some_and(|code| code.starts_with("en"))
    }

    fn is_asr(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Prefer a human-authored English track, then auto-generated English,
/// then whatever exists.
pub(crate) fn pick_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.is_english() && !t.is_asr())
        .or_else(|| tracks.iter().find(|t| t.is_english()))
        .or_else(|| tracks.first())
}

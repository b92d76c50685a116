//! Pipeline orchestrator: the single entry point external callers use.
//!
//! Sequencing is cache read → concurrent caption race → sequential audio
//! cascade → normalize → cache write, all under one overall deadline.
//! Intermediate failures are logged and recovered; only the final,
//! pipeline-level failure reaches the caller, as one descriptive error
//! naming the video.

use tracing::{info, warn};

use crate::cache::{CacheEntry, TranscriptCache};
use crate::cascade::{cascade_steps, run_cascade, CascadeStep};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::normalize::normalize;
use crate::race::run_race;
use crate::segment::{AcquisitionMethod, AcquisitionResult};
use crate::strategy::{caption_strategies, StrategyDescriptor};

const USER_AGENT: &str = concat!("vidscribe/", env!("CARGO_PKG_VERSION"));

/// An explicitly constructed pipeline instance owning its HTTP client,
/// configuration, cache and strategy set. Multiple independent instances
/// can coexist.
pub struct TranscriptPipeline {
    client: reqwest::Client,
    config: PipelineConfig,
    cache: TranscriptCache,
    strategies: Vec<StrategyDescriptor>,
    steps: Vec<CascadeStep>,
}

impl TranscriptPipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let strategies = caption_strategies(&config);
        let steps = cascade_steps(&config);
        Self::with_components(config, strategies, steps)
    }

    /// Build a pipeline over an explicit strategy and cascade set instead
    /// of the config-derived defaults.
    pub fn with_components(
        config: PipelineConfig,
        strategies: Vec<StrategyDescriptor>,
        steps: Vec<CascadeStep>,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let cache_dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(TranscriptCache::default_dir);
        let cache = TranscriptCache::open(cache_dir)?;

        // Startup sweep: clear out whatever expired since the last run.
        match cache.evict_expired() {
            Ok(removed) if removed > 0 => info!(removed, "startup cache eviction"),
            Ok(_) => {}
            Err(error) => warn!(%error, "startup cache eviction failed"),
        }

        Ok(Self {
            client,
            config,
            cache,
            strategies,
            steps,
        })
    }

    pub fn cache(&self) -> &TranscriptCache {
        &self.cache
    }

    /// Acquire a transcript for `video_id`, trying every configured
    /// strategy. Fails only when both the race and the cascade are
    /// exhausted or the overall deadline elapses.
    pub async fn fetch_transcript(&self, video_id: &str) -> PipelineResult<AcquisitionResult> {
        validate_video_id(video_id)?;

        if let Some(entry) = self.cache.get(video_id) {
            info!(
                video_id,
                original_method = %entry.original_method,
                "transcript served from cache"
            );
            return Ok(AcquisitionResult {
                segments: entry.segments,
                source: AcquisitionMethod::Cache,
            });
        }

        let budget = self.config.timeouts.pipeline;
        match tokio::time::timeout(budget, self.acquire(video_id)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Exhausted {
                video_id: video_id.to_string(),
                detail: format!("pipeline deadline of {}ms elapsed", budget.as_millis()),
            }),
        }
    }

    async fn acquire(&self, video_id: &str) -> PipelineResult<AcquisitionResult> {
        let race_result = run_race(
            &self.client,
            video_id,
            self.strategies.clone(),
            self.config.timeouts.race,
        )
        .await;

        let acquired = match race_result {
            Ok(result) => result,
            Err(race_error) => {
                info!(video_id, %race_error, "caption race failed, falling back to audio cascade");
                run_cascade(
                    &self.client,
                    video_id,
                    self.steps.clone(),
                    self.config.timeouts.cascade_step,
                )
                .await
                .map_err(|cascade_error| PipelineError::Exhausted {
                    video_id: video_id.to_string(),
                    detail: format!("race: {race_error}; cascade: {cascade_error}"),
                })?
            }
        };

        self.finish(video_id, acquired)
    }

    fn finish(
        &self,
        video_id: &str,
        mut result: AcquisitionResult,
    ) -> PipelineResult<AcquisitionResult> {
        result.segments = normalize(result.segments);
        if result.segments.is_empty() {
            return Err(PipelineError::Exhausted {
                video_id: video_id.to_string(),
                detail: "transcript was empty after normalization".to_string(),
            });
        }

        let entry = CacheEntry::new(video_id, result.segments.clone(), result.source);
        if let Err(error) = self.cache.put(entry) {
            // A cache write failure must not cost the caller the result.
            warn!(video_id, %error, "failed to cache transcript");
        }

        Ok(result)
    }
}

/// Upstream video identifiers are exactly 11 identifier-safe characters.
pub fn validate_video_id(video_id: &str) -> PipelineResult<()> {
    let valid = video_id.len() == 11
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidVideoId(video_id.to_string()))
    }
}

//! Fallback cascade: sequential audio download + transcription.
//!
//! Used only when the caption race produced nothing. Unlike the race,
//! steps run one at a time: every attempt costs a real audio download
//! and, for paid providers, real money, so speculative parallelism is
//! deliberately avoided. Steps whose capability is not configured are
//! skipped without counting as failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::{AudioSource, DirectAudio, RelayAudio, YtdlpAudio};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::segment::AcquisitionResult;
use crate::stt::{DeepgramStt, GroqStt, LocalWhisperStt, SpeechToText};

/// One audio-source / transcription-provider pair.
#[derive(Clone)]
pub struct CascadeStep {
    pub audio: Arc<dyn AudioSource>,
    pub stt: Arc<dyn SpeechToText>,
}

impl CascadeStep {
    pub fn new(audio: Arc<dyn AudioSource>, stt: Arc<dyn SpeechToText>) -> Self {
        Self { audio, stt }
    }

    pub fn name(&self) -> String {
        format!("{}+{}", self.audio.name(), self.stt.name())
    }
}

/// Build the cascade in priority order: decreasing reliability from the
/// current environment, increasing cost. Relay paths (constrained hosts)
/// first with the cheap provider, then direct-from-origin, then, where
/// spawning is allowed, yt-dlp with the cheap provider and finally the
/// self-hosted engine. Only configured pairs are emitted.
pub fn cascade_steps(config: &PipelineConfig) -> Vec<CascadeStep> {
    let groq = config
        .groq_api_key
        .clone()
        .map(|key| Arc::new(GroqStt::new(key)) as Arc<dyn SpeechToText>);
    let deepgram = config
        .deepgram_api_key
        .clone()
        .map(|key| Arc::new(DeepgramStt::new(key)) as Arc<dyn SpeechToText>);
    let local = config
        .whisper_service_url
        .clone()
        .map(|url| Arc::new(LocalWhisperStt::new(url)) as Arc<dyn SpeechToText>);

    let mut sources: Vec<(Arc<dyn AudioSource>, Vec<Option<&Arc<dyn SpeechToText>>>)> = Vec::new();

    if config.constrained {
        if let Some(relay_url) = &config.relay_url {
            sources.push((
                Arc::new(RelayAudio::new(relay_url.clone(), config.max_audio_bytes)),
                vec![groq.as_ref(), deepgram.as_ref()],
            ));
        }
    }

    sources.push((
        Arc::new(DirectAudio::new(config.max_audio_bytes)),
        vec![groq.as_ref(), deepgram.as_ref()],
    ));

    if config.can_spawn() {
        sources.push((
            Arc::new(YtdlpAudio::new(
                config.ytdlp_path.clone(),
                config.max_audio_bytes,
            )),
            vec![groq.as_ref(), local.as_ref()],
        ));
    }

    let mut steps = Vec::new();
    for (audio, providers) in sources {
        for provider in providers.into_iter().flatten() {
            steps.push(CascadeStep::new(Arc::clone(&audio), Arc::clone(provider)));
        }
    }
    steps
}

/// Run cascade steps sequentially, stopping at the first success. The
/// result is tagged with the provider actually used, not with "cascade".
pub async fn run_cascade(
    client: &reqwest::Client,
    video_id: &str,
    steps: Vec<CascadeStep>,
    step_budget: Duration,
) -> PipelineResult<AcquisitionResult> {
    if steps.is_empty() {
        return Err(PipelineError::Unavailable(
            "no transcription providers configured".to_string(),
        ));
    }

    let mut failures = Vec::new();

    for step in steps {
        let name = step.name();
        let started = Instant::now();
        debug!(step = %name, "attempting cascade step");

        let attempt = async {
            let audio = step.audio.fetch(client, video_id).await?;
            step.stt.transcribe(client, audio).await
        };

        let result = match tokio::time::timeout(step_budget, attempt).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                what: name.clone(),
                budget_ms: step_budget.as_millis() as u64,
            }),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(segments) if !segments.is_empty() => {
                info!(step = %name, elapsed_ms, "cascade step succeeded");
                return Ok(AcquisitionResult {
                    segments,
                    source: step.stt.method(),
                });
            }
            Ok(_) => {
                warn!(step = %name, elapsed_ms, "cascade step produced empty transcript");
                failures.push(format!("{name}: empty transcript"));
            }
            Err(error) => {
                warn!(step = %name, elapsed_ms, error = %error, "cascade step failed");
                failures.push(format!("{name}: {error}"));
            }
        }
    }

    Err(PipelineError::Unavailable(format!(
        "all cascade steps failed [{}]",
        failures.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_providers_produce_no_steps() {
        let steps = cascade_steps(&PipelineConfig::default());
        assert!(steps.is_empty());
    }

    #[test]
    fn step_order_tracks_cost_and_environment() {
        let config = PipelineConfig {
            constrained: true,
            relay_url: Some("https://relay.internal".into()),
            groq_api_key: Some("gsk".into()),
            deepgram_api_key: Some("dg".into()),
            ..PipelineConfig::default()
        };
        let names: Vec<String> = cascade_steps(&config).iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "relay-audio+groq",
                "relay-audio+deepgram",
                "direct-audio+groq",
                "direct-audio+deepgram",
            ]
        );
    }

    #[test]
    fn spawning_hosts_get_ytdlp_and_local_steps() {
        let config = PipelineConfig {
            groq_api_key: Some("gsk".into()),
            whisper_service_url: Some("http://10.0.0.5:8765".into()),
            ..PipelineConfig::default()
        };
        let names: Vec<String> = cascade_steps(&config).iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "direct-audio+groq",
                "ytdlp-audio+groq",
                "ytdlp-audio+local-whisper",
            ]
        );
    }

    #[test]
    fn missing_key_skips_the_pair_entirely() {
        // Deepgram unset: no deepgram step appears anywhere.
        let config = PipelineConfig {
            groq_api_key: Some("gsk".into()),
            ..PipelineConfig::default()
        };
        let names: Vec<String> = cascade_steps(&config).iter().map(|s| s.name()).collect();
        assert!(names.iter().all(|n| !n.contains("deepgram")));
    }
}

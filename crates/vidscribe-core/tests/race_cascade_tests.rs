//! Race and cascade semantics, driven by mock strategies on virtual time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vidscribe_core::audio::AudioSource;
use vidscribe_core::cascade::{run_cascade, CascadeStep};
use vidscribe_core::config::PipelineConfig;
use vidscribe_core::error::{PipelineError, PipelineResult};
use vidscribe_core::pipeline::TranscriptPipeline;
use vidscribe_core::race::run_race;
use vidscribe_core::segment::{AcquisitionMethod, TranscriptSegment};
use vidscribe_core::strategy::{CaptionStrategy, StrategyDescriptor};
use vidscribe_core::stt::SpeechToText;

const VIDEO_ID: &str = "dQw4w9WgXcQ";

fn segments(n: usize) -> Vec<TranscriptSegment> {
    (0..n)
        .map(|i| TranscriptSegment::new(format!("segment {i}"), i as f64, 1.0))
        .collect()
}

/// Caption strategy that sleeps, then succeeds or fails. Counts calls.
struct MockStrategy {
    name: &'static str,
    delay: Duration,
    outcome: Result<usize, &'static str>,
    calls: Arc<AtomicU32>,
}

impl MockStrategy {
    fn descriptor(
        name: &'static str,
        delay: Duration,
        outcome: Result<usize, &'static str>,
    ) -> (StrategyDescriptor, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let descriptor = StrategyDescriptor {
            strategy: Arc::new(MockStrategy {
                name,
                delay,
                outcome,
                calls: Arc::clone(&calls),
            }),
            timeout: Duration::from_secs(10),
            retries: 0,
            retry_delay: Duration::from_millis(100),
        };
        (descriptor, calls)
    }
}

#[async_trait]
impl CaptionStrategy for MockStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::CaptionScrape
    }

    async fn fetch(
        &self,
        _client: &reqwest::Client,
        _video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.outcome {
            Ok(n) => Ok(segments(n)),
            Err(detail) => Err(PipelineError::Parse(detail.to_string())),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn race_resolves_with_the_first_success() {
    let client = reqwest::Client::new();
    let (a, _) = MockStrategy::descriptor("a", Duration::from_secs(2), Ok(50));
    let (b, _) = MockStrategy::descriptor("b", Duration::from_secs(5), Ok(40));
    let (c, _) = MockStrategy::descriptor("c", Duration::from_secs(1), Err("boom"));

    let started = tokio::time::Instant::now();
    let result = run_race(&client, VIDEO_ID, vec![a, b, c], Duration::from_secs(30))
        .await
        .unwrap();

    // A's 50 segments win; the race settles at ~2s, not at B's 5s.
    assert_eq!(result.segments.len(), 50);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3), "race waited for a loser: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn race_rejects_only_when_every_strategy_fails() {
    let client = reqwest::Client::new();
    let (a, _) = MockStrategy::descriptor("a", Duration::from_millis(100), Err("no captions"));
    let (b, _) = MockStrategy::descriptor("b", Duration::from_millis(200), Err("blocked"));

    let error = run_race(&client, VIDEO_ID, vec![a, b], Duration::from_secs(30))
        .await
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("a:"), "aggregate should name strategy a: {message}");
    assert!(message.contains("b:"), "aggregate should name strategy b: {message}");
}

#[tokio::test(start_paused = true)]
async fn empty_results_do_not_win_the_race() {
    let client = reqwest::Client::new();
    let (empty, _) = MockStrategy::descriptor("empty", Duration::from_millis(100), Ok(0));
    let (real, _) = MockStrategy::descriptor("real", Duration::from_secs(2), Ok(10));

    let result = run_race(&client, VIDEO_ID, vec![empty, real], Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(result.segments.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn slow_strategies_hit_their_own_timeout() {
    let client = reqwest::Client::new();
    let (mut slow, calls) =
        MockStrategy::descriptor("slow", Duration::from_secs(60), Ok(10));
    slow.timeout = Duration::from_secs(3);

    let error = run_race(&client, VIDEO_ID, vec![slow], Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("slow"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_are_retried_with_a_delay() {
    let client = reqwest::Client::new();
    let (mut flaky, calls) =
        MockStrategy::descriptor("flaky", Duration::from_millis(50), Err("reset"));
    flaky.retries = 2;

    let _ = run_race(&client, VIDEO_ID, vec![flaky], Duration::from_secs(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn overall_race_timeout_bounds_pathological_strategies() {
    let client = reqwest::Client::new();
    let (mut hung, _) = MockStrategy::descriptor("hung", Duration::from_secs(600), Ok(1));
    hung.timeout = Duration::from_secs(900);

    let started = tokio::time::Instant::now();
    let error = run_race(&client, VIDEO_ID, vec![hung], Duration::from_secs(15))
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(16));
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

struct MockAudio {
    outcome: Result<usize, &'static str>,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl AudioSource for MockAudio {
    fn name(&self) -> &'static str {
        "mock-audio"
    }

    async fn fetch(
        &self,
        _client: &reqwest::Client,
        _video_id: &str,
    ) -> PipelineResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Ok(n) => Ok(vec![0u8; n]),
            Err(detail) => Err(PipelineError::Parse(detail.to_string())),
        }
    }
}

struct MockStt {
    name: &'static str,
    outcome: Result<usize, &'static str>,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl SpeechToText for MockStt {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::Groq
    }

    async fn transcribe(
        &self,
        _client: &reqwest::Client,
        _audio: Vec<u8>,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Ok(n) => Ok(segments(n)),
            Err(detail) => Err(PipelineError::Upstream {
                status: 500,
                detail: detail.to_string(),
            }),
        }
    }
}

fn step(
    audio_outcome: Result<usize, &'static str>,
    stt_name: &'static str,
    stt_outcome: Result<usize, &'static str>,
) -> (CascadeStep, Arc<AtomicU32>, Arc<AtomicU32>) {
    let audio_calls = Arc::new(AtomicU32::new(0));
    let stt_calls = Arc::new(AtomicU32::new(0));
    let step = CascadeStep::new(
        Arc::new(MockAudio {
            outcome: audio_outcome,
            calls: Arc::clone(&audio_calls),
        }),
        Arc::new(MockStt {
            name: stt_name,
            outcome: stt_outcome,
            calls: Arc::clone(&stt_calls),
        }),
    );
    (step, audio_calls, stt_calls)
}

#[tokio::test]
async fn cascade_stops_at_the_first_success() {
    let client = reqwest::Client::new();
    let (failing, ..) = step(Err("download blocked"), "provider-1", Ok(5));
    let (working, _, working_stt) = step(Ok(4096), "provider-2", Ok(7));
    let (never_reached, _, unreached_stt) = step(Ok(4096), "provider-3", Ok(9));

    let result = run_cascade(
        &client,
        VIDEO_ID,
        vec![failing, working, never_reached],
        Duration::from_secs(30),
    )
    .await
    .unwrap();

    assert_eq!(result.segments.len(), 7);
    assert_eq!(working_stt.load(Ordering::SeqCst), 1);
    assert_eq!(unreached_stt.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cascade_with_no_steps_is_unavailable_not_a_panic() {
    let client = reqwest::Client::new();
    let error = run_cascade(&client, VIDEO_ID, Vec::new(), Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::Unavailable(_)));
}

#[tokio::test]
async fn failed_audio_never_reaches_the_transcriber() {
    let client = reqwest::Client::new();
    let (failing, audio_calls, stt_calls) = step(Err("origin rejected"), "provider", Ok(5));

    let _ = run_cascade(&client, VIDEO_ID, vec![failing], Duration::from_secs(30)).await;
    assert_eq!(audio_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stt_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cascade_aggregates_step_failures() {
    let client = reqwest::Client::new();
    let (a, ..) = step(Ok(4096), "provider-1", Err("quota exhausted"));
    let (b, ..) = step(Err("no stream"), "provider-2", Ok(5));

    let error = run_cascade(&client, VIDEO_ID, vec![a, b], Duration::from_secs(30))
        .await
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("provider-1"));
    assert!(message.contains("provider-2"));
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

fn pipeline_with(
    strategies: Vec<StrategyDescriptor>,
    steps: Vec<CascadeStep>,
) -> (tempfile::TempDir, TranscriptPipeline) {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..PipelineConfig::default()
    };
    let pipeline = TranscriptPipeline::with_components(config, strategies, steps).unwrap();
    (dir, pipeline)
}

#[tokio::test]
async fn race_exhaustion_hands_off_to_the_cascade() {
    let (failing, strategy_calls) =
        MockStrategy::descriptor("a", Duration::from_millis(10), Err("no captions"));
    let (working, _, stt_calls) = step(Ok(4096), "provider", Ok(6));
    let (_dir, pipeline) = pipeline_with(vec![failing], vec![working]);

    let result = pipeline.fetch_transcript(VIDEO_ID).await.unwrap();

    // Every caption strategy failed, so the cascade must actually have
    // been attempted, and the result carries the provider's tag.
    assert_eq!(strategy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.source, AcquisitionMethod::Groq);
    assert!(!result.segments.is_empty());

    // A transcription-derived result is a durable cache entry.
    assert!(pipeline.cache().has_cached_stt(VIDEO_ID));
}

#[tokio::test]
async fn cache_hits_short_circuit_acquisition() {
    let (winner, strategy_calls) =
        MockStrategy::descriptor("win", Duration::from_millis(10), Ok(5));
    let (_dir, pipeline) = pipeline_with(vec![winner], Vec::new());

    let first = pipeline.fetch_transcript(VIDEO_ID).await.unwrap();
    assert_eq!(first.source, AcquisitionMethod::CaptionScrape);
    assert_eq!(strategy_calls.load(Ordering::SeqCst), 1);

    // Second fetch is served from the cache without touching a strategy.
    let second = pipeline.fetch_transcript(VIDEO_ID).await.unwrap();
    assert_eq!(second.source, AcquisitionMethod::Cache);
    assert_eq!(second.segments, first.segments);
    assert_eq!(strategy_calls.load(Ordering::SeqCst), 1);

    // Caption-derived entries are not durable speech-to-text results.
    assert!(!pipeline.cache().has_cached_stt(VIDEO_ID));
}

#[tokio::test]
async fn exhausted_pipelines_name_the_video() {
    let (failing, _) =
        MockStrategy::descriptor("a", Duration::from_millis(10), Err("no captions"));
    let (bad_step, ..) = step(Err("blocked"), "provider", Ok(5));
    let (_dir, pipeline) = pipeline_with(vec![failing], vec![bad_step]);

    let error = pipeline.fetch_transcript(VIDEO_ID).await.unwrap_err();
    assert!(matches!(error, PipelineError::Exhausted { .. }));
    assert!(error.to_string().contains(VIDEO_ID));
}

//! Strategy race: concurrent caption acquisition, first success wins.
//!
//! Every strategy runs as its own task-shaped future on the shared
//! executor; the first non-empty success resolves the race and the
//! remaining futures are dropped, which cancels them at their next
//! suspension point (yt-dlp children are additionally killed on drop).
//! An overall race timeout bounds total duration independently of the
//! per-strategy budgets.

use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, AcquisitionResult, TranscriptSegment};
use crate::strategy::StrategyDescriptor;

/// Race the given strategies and return the first non-empty success.
/// Fails only when every strategy has failed or the overall budget is
/// spent.
pub async fn run_race(
    client: &reqwest::Client,
    video_id: &str,
    strategies: Vec<StrategyDescriptor>,
    overall_budget: Duration,
) -> PipelineResult<AcquisitionResult> {
    if strategies.is_empty() {
        return Err(PipelineError::Unavailable(
            "no caption strategies configured".to_string(),
        ));
    }

    let mut in_flight: FuturesUnordered<_> = strategies
        .into_iter()
        .map(|descriptor| run_wrapped(client, video_id, descriptor))
        .collect();

    let race = async {
        let mut failures = Vec::new();
        while let Some(outcome) = in_flight.next().await {
            match outcome.result {
                Ok(segments) => {
                    info!(
                        strategy = outcome.name,
                        elapsed_ms = outcome.elapsed_ms,
                        segments = segments.len(),
                        "caption strategy won the race"
                    );
                    return Ok(AcquisitionResult {
                        segments,
                        source: outcome.method,
                    });
                }
                Err(error) => {
                    warn!(
                        strategy = outcome.name,
                        elapsed_ms = outcome.elapsed_ms,
                        error = %error,
                        "caption strategy failed"
                    );
                    failures.push(format!("{}: {error}", outcome.name));
                }
            }
        }
        Err(PipelineError::Unavailable(format!(
            "all caption strategies failed [{}]",
            failures.join("; ")
        )))
    };

    match tokio::time::timeout(overall_budget, race).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            what: "caption race".to_string(),
            budget_ms: overall_budget.as_millis() as u64,
        }),
    }
}

struct StrategyOutcome {
    name: &'static str,
    method: AcquisitionMethod,
    result: PipelineResult<Vec<TranscriptSegment>>,
    elapsed_ms: u64,
}

/// One strategy wrapped with its retry policy, then its per-strategy
/// timeout. Never returns an error directly: the outcome carries it so
/// the race can log and aggregate.
async fn run_wrapped(
    client: &reqwest::Client,
    video_id: &str,
    descriptor: StrategyDescriptor,
) -> StrategyOutcome {
    let name = descriptor.name();
    let method = descriptor.strategy.method();
    let started = Instant::now();

    let result = match tokio::time::timeout(
        descriptor.timeout,
        attempt_with_retries(client, video_id, &descriptor),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            what: name.to_string(),
            budget_ms: descriptor.timeout.as_millis() as u64,
        }),
    };

    StrategyOutcome {
        name,
        method,
        result,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

async fn attempt_with_retries(
    client: &reqwest::Client,
    video_id: &str,
    descriptor: &StrategyDescriptor,
) -> PipelineResult<Vec<TranscriptSegment>> {
    let mut last_error = PipelineError::EmptyTranscript;

    for attempt in 0..=descriptor.retries {
        match descriptor.strategy.fetch(client, video_id).await {
            Ok(segments) if !segments.is_empty() => return Ok(segments),
            Ok(_) => last_error = PipelineError::EmptyTranscript,
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => last_error = error,
        }
        if attempt < descriptor.retries {
            tokio::time::sleep(descriptor.retry_delay).await;
        }
    }

    Err(last_error)
}

//! Size-bounded, wall-clock-bounded streaming downloads.
//!
//! The declared `Content-Length` is only a fast pre-check; the real bound
//! is enforced on the bytes actually received, and the transfer is aborted
//! mid-stream the moment the running total crosses the cap. Servers lie.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use url::Url;

use crate::error::{PipelineError, PipelineResult};

/// Download a URL into memory, enforcing `max_bytes` and `budget`.
pub async fn fetch_bounded(
    client: &reqwest::Client,
    url: Url,
    max_bytes: u64,
    budget: Duration,
) -> PipelineResult<Vec<u8>> {
    let budget_ms = budget.as_millis() as u64;
    tokio::time::timeout(budget, fetch_inner(client, url, max_bytes))
        .await
        .map_err(|_| PipelineError::Timeout {
            what: "download".to_string(),
            budget_ms,
        })?
}

async fn fetch_inner(
    client: &reqwest::Client,
    url: Url,
    max_bytes: u64,
) -> PipelineResult<Vec<u8>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Upstream {
            status: status.as_u16(),
            detail: "download request rejected".to_string(),
        });
    }

    if let Some(declared) = response.content_length() {
        if declared > max_bytes {
            return Err(PipelineError::DeclaredTooLarge {
                declared,
                cap: max_bytes,
            });
        }
    }

    collect_bounded(response.bytes_stream().map_err(PipelineError::from), max_bytes).await
}

/// Accumulate a byte-chunk stream, failing as soon as the running total
/// exceeds `max_bytes`. Split out from the HTTP plumbing so the cap logic
/// is testable without a server.
pub(crate) async fn collect_bounded<S>(stream: S, max_bytes: u64) -> PipelineResult<Vec<u8>>
where
    S: Stream<Item = PipelineResult<Bytes>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(PipelineError::SizeExceeded { cap: max_bytes });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

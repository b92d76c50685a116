//! Caption strategy: operator-run relay endpoint.
//!
//! Constrained hosting environments have their primary egress path
//! blocked by the upstream provider, so an out-of-band relay performs the
//! fetch and returns segments in the canonical wire schema. The relay URL
//! comes from operator configuration, not from upstream responses, so it
//! is not subject to the origin guard.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, TranscriptSegment};

use super::CaptionStrategy;

#[derive(Debug, Deserialize)]
struct RelayTranscriptResponse {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

pub struct RelayStrategy {
    base_url: String,
}

impl RelayStrategy {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CaptionStrategy for RelayStrategy {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn method(&self) -> AcquisitionMethod {
        AcquisitionMethod::Relay
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> PipelineResult<Vec<TranscriptSegment>> {
        let url = format!("{}/transcript", self.base_url);
        let response = client
            .get(url)
            .query(&[("video_id", video_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Upstream {
                status: status.as_u16(),
                detail: "relay transcript request rejected".to_string(),
            });
        }

        let body: RelayTranscriptResponse = response.json().await?;
        Ok(body.segments)
    }
}

//! Pipeline configuration, sourced from the environment.
//!
//! Every credential is optional: a missing key makes the strategies that
//! need it unavailable, it never fails the pipeline outright. Strategy
//! selection downstream is pure capability detection over this struct.

use std::path::PathBuf;
use std::time::Duration;

/// Layered timeout budgets. Kept strictly ordered:
/// per-strategy < race < per-cascade-step < whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineTimeouts {
    /// Budget for one caption strategy, covering all of its retries.
    pub strategy: Duration,
    /// Budget for the whole concurrent caption race.
    pub race: Duration,
    /// Budget for one cascade step (audio download + transcription).
    pub cascade_step: Duration,
    /// Budget for the whole pipeline run (race + cascade).
    pub pipeline: Duration,
    /// Delay between retry attempts of a single strategy.
    pub retry_delay: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            strategy: Duration::from_secs(8),
            race: Duration::from_secs(20),
            cascade_step: Duration::from_secs(90),
            pipeline: Duration::from_secs(240),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Environment-derived configuration for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deepgram API key (`DEEPGRAM_API_KEY`).
    pub deepgram_api_key: Option<String>,
    /// Groq API key (`GROQ_API_KEY`).
    pub groq_api_key: Option<String>,
    /// Relay endpoint for constrained hosting (`VIDSCRIBE_RELAY_URL`).
    pub relay_url: Option<String>,
    /// Self-hosted whisper service (`WHISPER_SERVICE_URL`).
    pub whisper_service_url: Option<String>,
    /// yt-dlp binary (`YTDLP_PATH`, defaults to `yt-dlp` on PATH).
    pub ytdlp_path: String,
    /// Constrained hosting: primary egress is blocked, relay is preferred
    /// and external processes cannot be spawned (`VIDSCRIBE_CONSTRAINED`).
    pub constrained: bool,
    /// Override for process spawning (`VIDSCRIBE_ALLOW_SUBPROCESS`).
    pub allow_subprocess: Option<bool>,
    /// On-disk cache location override (`VIDSCRIBE_CACHE_DIR`).
    pub cache_dir: Option<PathBuf>,
    /// Hard byte cap for caption payloads.
    pub max_caption_bytes: u64,
    /// Hard byte cap for downloaded audio.
    pub max_audio_bytes: u64,
    /// Retry attempts per caption strategy (beyond the first).
    pub strategy_retries: u32,
    pub timeouts: PipelineTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deepgram_api_key: None,
            groq_api_key: None,
            relay_url: None,
            whisper_service_url: None,
            ytdlp_path: "yt-dlp".to_string(),
            constrained: false,
            allow_subprocess: None,
            cache_dir: None,
            max_caption_bytes: 10 * 1024 * 1024,
            max_audio_bytes: 25 * 1024 * 1024,
            strategy_retries: 1,
            timeouts: PipelineTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from environment variables. Missing variables
    /// leave the corresponding capability disabled.
    pub fn from_env() -> Self {
        let mut config = Self {
            deepgram_api_key: non_empty_env("DEEPGRAM_API_KEY"),
            groq_api_key: non_empty_env("GROQ_API_KEY"),
            relay_url: non_empty_env("VIDSCRIBE_RELAY_URL"),
            whisper_service_url: non_empty_env("WHISPER_SERVICE_URL"),
            constrained: env_flag("VIDSCRIBE_CONSTRAINED"),
            allow_subprocess: non_empty_env("VIDSCRIBE_ALLOW_SUBPROCESS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes")),
            cache_dir: non_empty_env("VIDSCRIBE_CACHE_DIR").map(PathBuf::from),
            ..Self::default()
        };
        if let Some(path) = non_empty_env("YTDLP_PATH") {
            config.ytdlp_path = path;
        }
        config
    }

    pub fn has_deepgram(&self) -> bool {
        self.deepgram_api_key.is_some()
    }

    pub fn has_groq(&self) -> bool {
        self.groq_api_key.is_some()
    }

    pub fn has_relay(&self) -> bool {
        self.relay_url.is_some()
    }

    pub fn has_local_whisper(&self) -> bool {
        self.whisper_service_url.is_some()
    }

    /// Whether shelling out to external processes is permitted. Constrained
    /// hosts cannot spawn; elsewhere it can be switched off explicitly.
    pub fn can_spawn(&self) -> bool {
        self.allow_subprocess.unwrap_or(!self.constrained)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    non_empty_env(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub mod audio;
pub mod cache;
pub mod cascade;
pub mod config;
pub mod download;
pub mod error;
pub mod guard;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod race;
pub mod segment;
pub mod strategy;
pub mod stt;

pub use audio::AudioSource;
pub use cache::{CacheEntry, TranscriptCache};
pub use cascade::{cascade_steps, run_cascade, CascadeStep};
pub use config::{PipelineConfig, PipelineTimeouts};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{validate_video_id, TranscriptPipeline};
pub use race::run_race;
pub use segment::{AcquisitionMethod, AcquisitionResult, TranscriptSegment, WordTiming};
pub use strategy::{caption_strategies, CaptionStrategy, StrategyDescriptor};
pub use stt::SpeechToText;

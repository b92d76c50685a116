use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vidscribe_core::{PipelineConfig, TranscriptCache, TranscriptPipeline};

#[derive(Parser)]
#[command(name = "vidscribe")]
#[command(about = "Fetch transcripts for remotely hosted videos", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a transcript, trying captions first and audio transcription
    /// as a fallback
    Fetch {
        /// The 11-character video id
        video_id: String,

        /// Emit the full segment list as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Inspect or maintain the on-disk transcript cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete expired and unreadable cache files
    Evict,

    /// Report whether a video has a usable cached transcript
    Check { video_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    match cli.command {
        Commands::Fetch { video_id, json } => {
            let pipeline = TranscriptPipeline::new(config)?;
            let result = pipeline
                .fetch_transcript(&video_id)
                .await
                .with_context(|| format!("failed to fetch transcript for {video_id}"))?;

            if json {
                serde_json::to_writer_pretty(std::io::stdout(), &result.segments)?;
                println!();
            } else {
                for segment in &result.segments {
                    println!("{}", segment.text);
                }
            }
            eprintln!("source: {}", result.source);
        }
        Commands::Cache { command } => {
            let dir = config
                .cache_dir
                .clone()
                .unwrap_or_else(TranscriptCache::default_dir);
            let cache = TranscriptCache::open(dir)?;

            match command {
                CacheCommands::Evict => {
                    let removed = cache.evict_expired()?;
                    println!("removed {removed} stale cache files");
                }
                CacheCommands::Check { video_id } => match cache.get(&video_id) {
                    Some(entry) => {
                        println!(
                            "cached: {} segments via {} at {}",
                            entry.segments.len(),
                            entry.original_method,
                            entry.cached_at.to_rfc3339()
                        );
                        if cache.has_cached_stt(&video_id) {
                            println!("durable: speech-to-text result, month-long retention");
                        }
                    }
                    None => println!("not cached"),
                },
            }
        }
    }

    Ok(())
}

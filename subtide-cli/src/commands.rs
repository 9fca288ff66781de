//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use subtide_core::cid::ContentId;
use subtide_core::config::{RunOptions, SubtideConfig};
use subtide_core::extraction::{ExtractionEngine, ExtractionRequest, FfmpegStreamExtractor};
use subtide_core::metadata::{InMemoryMetadataLink, MediaMetadata};
use subtide_core::streams::SubtitleFormat;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP extraction shell
    Serve {
        /// Host to bind to (overrides configuration)
        #[arg(long)]
        bind: Option<String>,
        /// Port to bind to (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Extract subtitle streams from one local video file
    Extract {
        /// Source video file
        file: PathBuf,
        /// JSON file holding the video's metadata bag
        #[arg(long)]
        metadata: PathBuf,
        /// Directory artifacts are written into (overrides configuration)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Target subtitle format (overrides configuration)
        #[arg(long, value_enum)]
        format: Option<SubtitleFormat>,
        /// Bypass idempotence short-circuits and already-exists checks
        #[arg(long)]
        force: bool,
    },
    /// Print the content identifier of a file
    Cid {
        /// File to identify
        file: PathBuf,
    },
}

/// Dispatches one parsed CLI command.
///
/// # Errors
/// Returns the failing subsystem's error for the command that fails
pub async fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { bind, port } => serve(bind, port).await,
        Commands::Extract {
            file,
            metadata,
            output_dir,
            format,
            force,
        } => extract_file(file, metadata, output_dir, format, force).await,
        Commands::Cid { file } => print_cid(file).await,
    }
}

async fn serve(bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = SubtideConfig::from_env();
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    subtide_server::run_server(config).await?;
    Ok(())
}

/// Runs one extraction locally with an in-memory metadata link and prints
/// the completion report as JSON.
async fn extract_file(
    file: PathBuf,
    metadata_path: PathBuf,
    output_dir: Option<PathBuf>,
    format: Option<SubtitleFormat>,
    force: bool,
) -> anyhow::Result<()> {
    let config = SubtideConfig::from_env();

    let raw = tokio::fs::read_to_string(&metadata_path)
        .await
        .with_context(|| format!("reading metadata file {}", metadata_path.display()))?;
    let mut metadata: MediaMetadata = serde_json::from_str(&raw)
        .with_context(|| format!("parsing metadata file {}", metadata_path.display()))?;

    // Fall back to a filename-derived title the way the library scanner
    // names untitled media.
    if metadata.title().is_none()
        && let Some(stem) = file.file_stem().and_then(|s| s.to_str())
    {
        metadata.insert(MediaMetadata::TITLE, stem.replace(['.', '_'], " "));
    }

    let video_cid = ContentId::from_file(&file).await?;
    let options = RunOptions {
        force_recompute: force || config.extraction.force_recompute,
        output_format: format.unwrap_or(config.extraction.output_format),
    };

    let extractor = Arc::new(FfmpegStreamExtractor::new(
        config.extraction.tool_path.clone(),
        config.extraction.stream_timeout,
    ));
    let link = Arc::new(InMemoryMetadataLink::new());
    let engine = ExtractionEngine::new(config.extraction.clone(), extractor, link);

    let request = ExtractionRequest {
        video_cid,
        locator: file.display().to_string(),
        metadata,
        output_dir: output_dir.unwrap_or_else(|| config.extraction.output_dir.clone()),
        options,
    };

    let report = engine.run(&request).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn print_cid(file: PathBuf) -> anyhow::Result<()> {
    let cid = ContentId::from_file(&file).await?;
    println!("{cid}");
    Ok(())
}

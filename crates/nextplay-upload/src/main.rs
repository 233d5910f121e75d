//! Headless capture-to-publish driver.
//!
//! Imports a local video, applies the requested trim and cover, then runs
//! the full upload flow while printing every state change as JSON.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nextplay_client::{ApiClient, ApiClientConfig, EnvToken};
use nextplay_media::{FfmpegFrameExtractor, FfmpegTrimExporter, FfprobeProbe};
use nextplay_models::{Category, MetadataDraft, Visibility};
use nextplay_upload::{OrchestratorState, UploadConfig, UploadOrchestrator};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Upload a short video to NextPlay",
    long_about = "Trims, uploads and publishes a local clip through the NextPlay upload API."
)]
struct Cli {
    /// Video file to upload
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    #[arg(long)]
    title: String,

    /// One of: sports, dance, art, comedy, stem, gaming, music, fitness
    #[arg(long)]
    category: Category,

    /// Hashtag, repeatable (at most 5)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    #[arg(long, default_value_t = false)]
    private: bool,

    /// Cover frame timestamp in seconds
    #[arg(long, value_name = "SECONDS")]
    cover: Option<f64>,

    /// Trim window start in seconds
    #[arg(long, value_name = "SECONDS")]
    start: Option<f64>,

    /// Trim window end in seconds
    #[arg(long, value_name = "SECONDS")]
    end: Option<f64>,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("nextplay=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Observer that writes each state as one JSON line, in order.
fn state_printer<W>(out: Arc<Mutex<W>>) -> impl Fn(&OrchestratorState) + Send + Sync + 'static
where
    W: Write + Send + 'static,
{
    move |state| {
        let line = match serde_json::to_string(state) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize state: {}", e);
                return;
            }
        };
        let Ok(mut out) = out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write state: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    info!("Starting nextplay-upload");

    let api_config = ApiClientConfig::from_env().context("invalid API configuration")?;
    let config = UploadConfig::from_env();
    info!("Upload config: {:?}", config);

    let client = ApiClient::new(api_config, Arc::new(EnvToken))?;
    let mut orchestrator = UploadOrchestrator::new(
        client,
        config,
        Arc::new(FfprobeProbe),
        Arc::new(FfmpegFrameExtractor::new()),
    )
    .with_exporter(Arc::new(FfmpegTrimExporter::default()))
    .with_observer(state_printer(Arc::new(Mutex::new(std::io::stdout()))));

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            cancel.cancel();
        }
    });

    orchestrator.import(&cli.video).await?;
    if let Some(start) = cli.start {
        orchestrator.set_trim_start(start)?;
    }
    if let Some(end) = cli.end {
        orchestrator.set_trim_end(end)?;
    }
    if let Some(cover) = cli.cover {
        orchestrator.set_cover_time(cover).await?;
    }
    orchestrator.continue_to_metadata().await?;

    let visibility = if cli.private {
        Visibility::Private
    } else {
        Visibility::Public
    };
    let draft = cli
        .tags
        .into_iter()
        .fold(MetadataDraft::new(cli.title, cli.category), MetadataDraft::with_tag)
        .with_visibility(visibility);

    match orchestrator.commit_metadata_and_upload(&draft).await {
        Ok(published) => {
            info!(video_id = %published.video_id, "Published");
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            warn!("Upload cancelled");
            Ok(())
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            Err(anyhow!(e.user_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nextplay_media::{FrameExtractor, MediaProbe, MediaResult};
    use nextplay_models::{CoverImage, MediaSource};
    use std::path::Path;

    struct FixedProbe;

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, path: &Path) -> MediaResult<MediaSource> {
            Ok(MediaSource::new(path, 8.0, "mp4")?)
        }
    }

    struct StillFrame;

    #[async_trait]
    impl FrameExtractor for StillFrame {
        async fn extract_frame(&self, _source: &MediaSource, time: f64) -> MediaResult<CoverImage> {
            Ok(CoverImage::jpeg(vec![0xFF, 0xD8], time))
        }
    }

    fn lines(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<serde_json::Value> {
        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[test]
    fn test_printer_keeps_every_progress_step() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let print = state_printer(Arc::clone(&buf));
        for progress in [10.0, 20.0, 30.0] {
            print(&OrchestratorState::Uploading { progress });
        }
        print(&OrchestratorState::Closed);

        let printed = lines(&buf);
        assert_eq!(printed.len(), 4);
        assert_eq!(printed[1]["state"], "uploading");
        assert_eq!(printed[1]["progress"], 20.0);
        assert_eq!(printed[3]["state"], "closed");
    }

    #[tokio::test]
    async fn test_states_are_printed_before_call_returns() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"data").unwrap();

        let mut api = ApiClientConfig::default();
        api.analytics_enabled = false;
        let client = ApiClient::new(api, Arc::new(nextplay_client::StaticToken::new("t"))).unwrap();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = UploadOrchestrator::new(
            client,
            UploadConfig::default(),
            Arc::new(FixedProbe),
            Arc::new(StillFrame),
        )
        .with_observer(state_printer(Arc::clone(&buf)));

        orchestrator.import(&video).await.unwrap();
        orchestrator.cancel();

        let states: Vec<_> = lines(&buf).iter().map(|v| v["state"].clone()).collect();
        assert_eq!(states, vec!["importing", "trimming", "closed"]);
    }
}

//! Configuration-driven export command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use cadenza_config::{ExportConfig, find_config};
use cadenza_core::{ProcessingChain, TrackType};
use cadenza_export::{ExportEvent, ExportSession, MemoryMuxer, Muxer, ProgressState, WavMuxer};
use cadenza_registry::{AssetLoaderRegistry, LoaderSetup, ProcessorRegistry};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct ExportArgs {
    /// Export configuration: a TOML path or the name of a saved export
    #[arg(value_name = "CONFIG")]
    config: String,

    /// Override the configured output path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long, default_value = "600")]
    timeout: u64,

    /// Do not draw a progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: ExportArgs) -> anyhow::Result<()> {
    let path = find_config(&args.config)
        .ok_or_else(|| anyhow!("export configuration not found: {}", args.config))?;
    let mut config = ExportConfig::load(&path)?;
    if let Some(base) = path.parent() {
        config.resolve_relative_paths(base);
    }
    if let Some(output) = args.output.clone() {
        config.output.path = Some(output);
    }
    config
        .validate()
        .with_context(|| format!("invalid export configuration {}", path.display()))?;

    let chain = config.build_chain(&ProcessorRegistry::new())?;
    info!(
        name = %config.name,
        input = config.input.tag(),
        stages = ?chain.stage_names(),
        "starting export"
    );

    match config.input.track_type() {
        TrackType::Audio => {
            let output = config
                .output
                .path
                .clone()
                .ok_or_else(|| anyhow!("audio exports need an output path"))?;
            let session = ExportSession::new(WavMuxer::new(&output));
            drive(&config, chain, &session, &args)?;
            let frames = session.handshake().lock().muxer().frames_written();
            println!("Wrote {} ({frames} frames)", output.display());
        }
        TrackType::Video => {
            let session = ExportSession::new(MemoryMuxer::new().without_data());
            drive(&config, chain, &session, &args)?;
            let summary = session.handshake().lock().muxer().summary();
            let json = serde_json::to_string_pretty(&summary)?;
            match &config.output.path {
                Some(output) => {
                    std::fs::write(output, json)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!("Wrote {}", output.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

/// Run the configured loader into `session` until it completes or fails.
fn drive<M: Muxer + 'static>(
    config: &ExportConfig,
    chain: ProcessingChain,
    session: &Arc<ExportSession<M>>,
    args: &ExportArgs,
) -> anyhow::Result<()> {
    let mut loader = AssetLoaderRegistry::new().create(
        config.input.tag(),
        &config.input.loader_params(),
        LoaderSetup {
            listener: session.clone(),
            chain,
            options: config.loader_options(),
        },
    )?;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("##-"),
    );

    loader.start();
    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let result = loop {
        match session.next_event(POLL_INTERVAL) {
            Some(ExportEvent::Completed) => break Ok(()),
            Some(ExportEvent::Error(err)) => break Err(anyhow::Error::new(err)),
            Some(event) => debug!(?event, "export event"),
            None => {}
        }
        if let ProgressState::Available(percent) = loader.progress() {
            pb.set_position(percent.into());
        }
        if Instant::now() >= deadline {
            break Err(anyhow!("export did not finish within {}s", args.timeout));
        }
    };
    loader.release();

    match &result {
        Ok(()) => {
            pb.set_position(100);
            pb.finish_with_message("done");
        }
        Err(_) => pb.abandon_with_message("failed"),
    }
    result
}

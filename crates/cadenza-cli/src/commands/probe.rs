//! Display a WAV file's format as the export pipeline reads it.

use std::path::PathBuf;

use cadenza_export::{AudioSource, WavSource};
use clap::Args;

#[derive(Args)]
pub struct ProbeArgs {
    /// Path to the WAV file
    file: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: &ProbeArgs) -> anyhow::Result<()> {
    let source = WavSource::open(&args.file)?;
    let format = source.format();
    let frames = source.total_frames();
    let duration_us = source.duration_us();

    if args.json {
        let value = serde_json::json!({
            "path": args.file.display().to_string(),
            "encoding": format.encoding.name(),
            "sample_rate": format.sample_rate,
            "channel_count": format.channel_count,
            "bytes_per_frame": format.bytes_per_frame(),
            "frames": frames,
            "duration_us": duration_us,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File:        {}", args.file.display());
    println!("Encoding:    {}", format.encoding.name());
    println!("Channels:    {}", format.channel_count);
    println!("Sample Rate: {} Hz", format.sample_rate);
    println!(
        "Duration:    {:.3}s ({frames} frames)",
        duration_us as f64 / 1_000_000.0
    );
    Ok(())
}

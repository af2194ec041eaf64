//! Integration tests for the `cadenza` binary.

use std::path::Path;
use std::process::{Command, Output};

fn cadenza_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cadenza"))
}

fn run(args: &[&str]) -> Output {
    cadenza_bin()
        .args(args)
        .output()
        .expect("failed to run cadenza")
}

fn write_config(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_owned()
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[test]
fn cli_processors_lists_every_processor() {
    let output = run(&["processors"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Processors"));
    for id in ["gain", "to-int16", "to-float", "channel-map", "resample"] {
        assert!(stdout.contains(id), "listing should contain '{id}'");
    }
}

#[test]
fn cli_processor_detail_shows_params() {
    let output = run(&["processors", "gain"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("factor, db"));
    assert!(stdout.contains("Category: Level"));
}

#[test]
fn cli_unknown_processor_fails() {
    let output = run(&["processors", "reverb"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown processor"));
}

#[test]
fn cli_loaders_tags() {
    let output = run(&["loaders", "--tags"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["image", "wav", "tone", "silence"]);
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

#[test]
fn cli_export_tone_writes_wav() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "tone.toml",
        r#"
        name = "tone"
        retry_interval_ms = 1

        [input]
        type = "tone"
        duration_us = 250000
        sample_rate = 16000
        channel_count = 2

        [output]
        path = "tone.wav"
        bits_per_sample = 16

        [[processors]]
        type = "gain"
        params = { db = "-6" }
        "#,
    );

    let output = run(&["export", &config, "--quiet"]);
    assert!(
        output.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reader = hound::WavReader::open(dir.path().join("tone.wav")).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.duration(), 4000);
}

#[test]
fn cli_export_image_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]))
        .save(dir.path().join("cover.png"))
        .unwrap();
    let config = write_config(
        dir.path(),
        "cover.toml",
        r#"
        name = "cover"

        [input]
        type = "image"
        path = "cover.png"
        duration_us = 1000000
        frame_rate = 10
        "#,
    );

    let output = run(&["export", &config, "--quiet"]);
    assert!(
        output.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["finished"], true);
    let track = &summary["tracks"][0];
    assert_eq!(track["track"], "video");
    assert_eq!(track["sample_count"], 10);
    assert_eq!(track["first_timestamp_us"], 0);
    assert_eq!(track["last_timestamp_us"], 900_000);
    assert_eq!(track["ended"], true);
}

#[test]
fn cli_export_missing_input_reports_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "missing.toml",
        r#"
        name = "missing"

        [input]
        type = "wav"
        path = "absent.wav"

        [output]
        path = "out.wav"
        "#,
    );

    let output = run(&["export", &config]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR_CODE_IO_FILE_NOT_FOUND"), "got: {stderr}");
    assert!(!dir.path().join("out.wav").exists());
}

#[test]
fn cli_export_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "bad.toml",
        r#"
        name = "bad"

        [input]
        type = "silence"
        duration_us = 1000

        [output]
        path = "out.wav"
        bits_per_sample = 24
        "#,
    );

    let output = run(&["export", &config]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid export configuration"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[test]
fn cli_probe_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..800 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let output = run(&["probe", path.to_str().unwrap(), "--json"]);
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["sample_rate"], 8000);
    assert_eq!(info["channel_count"], 1);
    assert_eq!(info["frames"], 800);
    assert_eq!(info["duration_us"], 100_000);
    assert_eq!(info["bytes_per_frame"], 2);
}

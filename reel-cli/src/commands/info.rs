//! Info command - show backend capabilities and effective configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use reel_core::gpu::BackendCapabilities;
use reel_core::{FilterPreference, GpuBackend, PixelFormat, SoftwareBackend};
use serde::Serialize;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Config file to read instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct InfoReport {
    config_path: PathBuf,
    backend: BackendCapabilities,
    filter: &'static str,
    max_streams: usize,
    max_draw_contexts: usize,
    canvas: String,
    unscaled_canvas: String,
    max_stream_dimension: u32,
    fence_timeout_ms: Option<u128>,
    formats: Vec<&'static str>,
}

/// Show backend capabilities and the configuration the compositor would use
pub async fn info(args: InfoArgs) -> Result<()> {
    let (config_path, config) = super::load_config(args.config.as_ref())?;
    let backend = SoftwareBackend::new().capabilities();

    let filter = match config.filter {
        FilterPreference::Auto if backend.linear_blit => "linear",
        _ => "nearest",
    };

    let report = InfoReport {
        config_path,
        filter,
        max_streams: config.max_streams,
        max_draw_contexts: config.max_draw_contexts,
        canvas: config.canvas.to_string(),
        unscaled_canvas: config.unscaled_canvas.to_string(),
        max_stream_dimension: config.max_stream_dimension.min(backend.max_image_dimension),
        fence_timeout_ms: config.fence_timeout.map(|t| t.as_millis()),
        formats: [
            PixelFormat::Rgba8,
            PixelFormat::Rgbx8,
            PixelFormat::Bgra8,
            PixelFormat::Bgrx8,
        ]
        .iter()
        .map(|f| f.name())
        .collect(),
        backend,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Reel - System Information\n");

    println!("Backend:");
    println!("  Name:          {}", report.backend.name);
    println!("  Scaled blit:   {}", yes_no(report.backend.scaled_blit));
    println!("  Linear filter: {}", yes_no(report.backend.linear_blit));
    println!("  Max image:     {} px", report.backend.max_image_dimension);
    println!();

    println!("Configuration ({}):", report.config_path.display());
    println!("  Canvas:           {}", report.canvas);
    println!("  Unscaled canvas:  {}", report.unscaled_canvas);
    println!("  Blit filter:      {}", report.filter);
    println!("  Max streams:      {}", report.max_streams);
    println!("  Max sources:      {}", report.max_draw_contexts);
    println!("  Max stream side:  {} px", report.max_stream_dimension);
    match report.fence_timeout_ms {
        Some(ms) => println!("  Fence timeout:    {} ms", ms),
        None => println!("  Fence timeout:    unbounded"),
    }
    println!();

    println!("Stream formats: {}", report.formats.join(", "));

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

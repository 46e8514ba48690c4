//! Compose command - composite synthetic sources on the software backend

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use reel_core::metrics::CompositorStats;
use reel_core::{
    Compositor, CompositorConfig, Extent2D, FilterPreference, FrameReport, NormalizedRect,
    PixelFormat, SoftwareBackend, StreamHandle,
};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

/// A synthetic source: `WIDTHxHEIGHT@x,y,w,h[:format]`
///
/// Placement is normalized with a bottom-left origin. Format defaults
/// to bgrx, the common screencast layout.
#[derive(Debug, Clone)]
pub struct SourceArg {
    extent: Extent2D,
    placement: NormalizedRect,
    format: PixelFormat,
}

impl FromStr for SourceArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (size, rest) = s
            .split_once('@')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT@x,y,w,h[:format], got '{}'", s))?;
        let extent =
            Extent2D::parse(size).ok_or_else(|| format!("invalid stream size '{}'", size))?;

        let (rect, format) = match rest.split_once(':') {
            Some((rect, format)) => (
                rect,
                format.parse::<PixelFormat>().map_err(|e| e.to_string())?,
            ),
            None => (rest, PixelFormat::Bgrx8),
        };
        let placement =
            NormalizedRect::parse(rect).ok_or_else(|| format!("invalid placement '{}'", rect))?;

        Ok(Self {
            extent,
            placement,
            format,
        })
    }
}

/// Arguments for the compose command
#[derive(Args)]
pub struct ComposeArgs {
    /// Source to place, as WIDTHxHEIGHT@x,y,w,h[:format] (repeatable)
    #[arg(short, long = "source", value_name = "SOURCE", required = true)]
    sources: Vec<SourceArg>,

    /// Resize the preview canvas to this size after startup
    #[arg(long, value_name = "WxH")]
    canvas: Option<String>,

    /// Number of frames to compose
    #[arg(short = 'n', long, default_value = "1")]
    frames: u32,

    /// Frame rate of the compose loop
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Remove the last source's stream after this many frames
    #[arg(long, value_name = "FRAME")]
    remove_after: Option<u32>,

    /// Force nearest-neighbor blits
    #[arg(long)]
    nearest: bool,

    /// Save the unscaled canvas as PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the preview canvas as PNG
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Config file to read instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ComposeSummary {
    canvas: Extent2D,
    unscaled_canvas: Extent2D,
    sources: usize,
    frames: Vec<FrameReport>,
    stats: CompositorStats,
}

/// Run the compose loop until `--frames` frames are submitted or Ctrl+C
pub async fn compose(args: ComposeArgs) -> Result<()> {
    if args.fps == 0 {
        bail!("--fps must be at least 1");
    }

    let (_, mut config) = super::load_config(args.config.as_ref())?;
    if args.nearest {
        config = config.with_filter(FilterPreference::Nearest);
    }
    let mut compositor = start_compositor(config, args.canvas.as_deref())?;

    let mut streams: Vec<(StreamHandle, &SourceArg)> = Vec::with_capacity(args.sources.len());
    for source in &args.sources {
        let stream = compositor
            .create_stream(source.format, source.extent.width, source.extent.height)
            .with_context(|| {
                format!("Failed to create {} {} stream", source.extent, source.format)
            })?;
        compositor
            .add_video_source(stream, source.placement)
            .with_context(|| format!("Failed to place source at {}", source.placement))?;
        info!("Placed {} {} source at {}", source.extent, source.format, source.placement);
        streams.push((stream, source));
    }

    let mut reports = Vec::with_capacity(args.frames as usize);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(args.fps)));
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for frame in 0..args.frames {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                warn!("Interrupted after {} frames", frame);
                break;
            }
        }

        if args.remove_after == Some(frame) {
            if let Some((stream, _)) = streams.pop() {
                compositor.remove_stream(stream)?;
                info!("Queued removal of {}", stream);
            }
        }

        for (index, (stream, source)) in streams.iter().enumerate() {
            let pixels = test_pattern(source, index, frame);
            compositor.write_stream_frame(*stream, &pixels)?;
        }

        let report = compositor.compose_frame()?;
        debug!(
            "Frame {}: {} blits ({} clipped), {} removals",
            report.frame, report.blits, report.clipped_blits, report.removals_applied
        );
        reports.push(report);
    }
    compositor.wait_idle()?;

    if let Some(ref path) = args.output {
        let extent = compositor.unscaled_canvas_dimensions();
        save_png(path, extent, compositor.unscaled_canvas_pixels()?)?;
    }
    if let Some(ref path) = args.preview {
        let extent = compositor.canvas_dimensions();
        save_png(path, extent, compositor.canvas_pixels()?)?;
    }

    let summary = ComposeSummary {
        canvas: compositor.canvas_dimensions(),
        unscaled_canvas: compositor.unscaled_canvas_dimensions(),
        sources: compositor.draw_context_count(),
        frames: reports,
        stats: compositor.stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Composed {} frames: {} on {} preview / {} unscaled",
            summary.frames.len(),
            plural(summary.sources, "source"),
            summary.canvas,
            summary.unscaled_canvas
        );
        println!("  {}", summary.stats.format_line());
        for path in [&args.output, &args.preview].into_iter().flatten() {
            println!("  Wrote {}", path.display());
        }
    }

    Ok(())
}

/// Build the compositor, then resize the preview canvas if one was requested
fn start_compositor(
    config: CompositorConfig,
    canvas: Option<&str>,
) -> Result<Compositor<SoftwareBackend>> {
    let mut compositor =
        Compositor::new(SoftwareBackend::new(), config).context("Failed to start compositor")?;

    if let Some(canvas) = canvas {
        let extent = Extent2D::parse(canvas)
            .with_context(|| format!("Invalid canvas size '{}', expected WxH", canvas))?;
        compositor
            .resize_canvas(extent.width, extent.height)
            .with_context(|| format!("Failed to resize canvas to {}", extent))?;
    }
    Ok(compositor)
}

/// Moving gradient, tinted per source so overlaps are visible
fn test_pattern(source: &SourceArg, index: usize, frame: u32) -> Vec<u8> {
    let Extent2D { width, height } = source.extent;
    let tint = [(index * 97 % 256) as u8, (index * 53 % 256) as u8, 160];
    let shift = frame.wrapping_mul(4) % width.max(1);

    let mut data = Vec::with_capacity(source.extent.pixel_count() * 4);
    for y in 0..height {
        for x in 0..width {
            let r = (((x + shift) % width.max(1)) * 255 / width.max(1)) as u8;
            let g = ((y * 255) / height.max(1)) as u8;
            let rgba = [r ^ tint[0], g ^ tint[1], tint[2], 255];
            data.extend_from_slice(&source.format.from_rgba(rgba));
        }
    }
    data
}

fn save_png(path: &Path, extent: Extent2D, pixels: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    image::save_buffer_with_format(
        path,
        pixels,
        extent.width,
        extent.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

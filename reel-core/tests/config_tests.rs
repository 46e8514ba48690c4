//! Integration tests for configuration system

use std::time::Duration;

use reel_core::config::{sample_config, CompositorConfig, ConfigFile, FilterPreference};
use reel_core::{Compositor, Extent2D, ReelError, Rgba8, SoftwareBackend};
use tempfile::TempDir;

#[test]
fn test_compositor_config_defaults() {
    let config = CompositorConfig::default();
    assert_eq!(config.max_streams, 8);
    assert_eq!(config.max_draw_contexts, 32);
    assert_eq!(config.canvas, Extent2D::new(1280, 720));
    assert_eq!(config.unscaled_canvas, Extent2D::new(1920, 1080));
    assert_eq!(config.background, Rgba8([0, 0, 0, 255]));
    assert_eq!(config.filter, FilterPreference::Auto);
    assert_eq!(config.max_stream_dimension, 4096);
    assert_eq!(config.fence_timeout, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_compositor_config_validation() {
    let invalid = [
        CompositorConfig::default().with_max_streams(0),
        CompositorConfig::default().with_max_draw_contexts(0),
        CompositorConfig::default().with_canvas(1280, 0),
        CompositorConfig::default().with_unscaled_canvas(0, 0),
        CompositorConfig::default().with_canvas(20_000, 720),
        CompositorConfig::default().with_max_stream_dimension(0),
        CompositorConfig::default().with_fence_timeout(Duration::ZERO),
    ];
    for config in invalid {
        assert!(
            matches!(config.validate(), Err(ReelError::Config(_))),
            "{:?} should be rejected",
            config
        );
    }
}

#[test]
fn test_invalid_config_fails_compositor_startup() {
    let result = Compositor::new(
        SoftwareBackend::new(),
        CompositorConfig::default().with_max_streams(0),
    );
    assert!(matches!(result, Err(ReelError::Config(_))));
}

#[test]
fn test_config_file_default() {
    let config = ConfigFile::default();
    assert_eq!(config.canvas.size, "1280x720");
    assert_eq!(config.canvas.unscaled_size, "1920x1080");
    assert_eq!(config.canvas.background, [0, 0, 0, 255]);
    assert_eq!(config.streams.max_draw_contexts, 32);
    assert_eq!(config.sync.fence_timeout_ms, 0);
}

#[test]
fn test_config_file_sample_parses() {
    let sample = sample_config();
    let parsed: ConfigFile = toml::from_str(&sample).expect("Sample config should parse");
    assert_eq!(parsed, ConfigFile::default());
}

#[test]
fn test_config_file_save_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("reel").join("config.toml");

    // Create and save config
    let mut config = ConfigFile::default();
    config.canvas.size = "800x600".to_string();
    config.canvas.filter = FilterPreference::Nearest;
    config.streams.max_streams = 4;
    config.sync.fence_timeout_ms = 2000;
    config
        .save_to(&config_path)
        .expect("Failed to save config");

    // Load and verify
    let loaded = ConfigFile::load_from(&config_path).expect("Failed to load config");
    assert_eq!(loaded, config);

    let compositor = loaded.to_compositor_config().unwrap();
    assert_eq!(compositor.canvas, Extent2D::new(800, 600));
    assert_eq!(compositor.max_streams, 4);
    assert_eq!(compositor.filter, FilterPreference::Nearest);
    assert_eq!(compositor.fence_timeout, Some(Duration::from_secs(2)));
}

#[test]
fn test_config_file_load_nonexistent() {
    let result = ConfigFile::load_from("/nonexistent/path/config.toml");
    assert_eq!(result.unwrap(), ConfigFile::default());
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[canvas]\nsize = \"640x360\"\n\n[streams]\nmax_streams = 2\n",
    )
    .unwrap();

    let loaded = ConfigFile::load_from(&config_path).unwrap();
    assert_eq!(loaded.canvas.size, "640x360");
    assert_eq!(loaded.canvas.unscaled_size, "1920x1080");
    assert_eq!(loaded.streams.max_streams, 2);
    assert_eq!(loaded.streams.max_draw_contexts, 32);
    assert_eq!(loaded.sync.fence_timeout_ms, 0);
}

#[test]
fn test_malformed_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[canvas\nsize = 3").unwrap();

    let err = ConfigFile::load_from(&config_path).unwrap_err();
    assert!(matches!(err, ReelError::Config(_)));
    assert!(err.user_hint().unwrap().contains("config.toml"));
}

#[test]
fn test_unknown_filter_rejected() {
    let result: Result<ConfigFile, _> = toml::from_str("[canvas]\nfilter = \"bicubic\"\n");
    assert!(result.is_err());
}

#[test]
fn test_config_file_drives_compositor() {
    let mut file = ConfigFile::default();
    file.canvas.size = "160x90".to_string();
    file.canvas.unscaled_size = "320x180".to_string();
    file.canvas.background = [1, 2, 3, 255];
    file.streams.max_streams = 1;

    let config = file.to_compositor_config().unwrap();
    let mut compositor = Compositor::new(SoftwareBackend::new(), config).unwrap();
    assert_eq!(compositor.canvas_dimensions(), Extent2D::new(160, 90));
    assert_eq!(compositor.unscaled_canvas_dimensions(), Extent2D::new(320, 180));

    let pixels = compositor.unscaled_canvas_pixels().unwrap();
    assert_eq!(&pixels[..4], &[1, 2, 3, 255]);

    compositor
        .create_stream(reel_core::PixelFormat::Rgba8, 8, 8)
        .unwrap();
    assert!(compositor
        .create_stream(reel_core::PixelFormat::Rgba8, 8, 8)
        .unwrap_err()
        .is_capacity());
}

#[test]
fn test_create_default_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("reel").join("config.toml");

    // Fresh directory gets the commented sample
    assert!(ConfigFile::create_default_at(&config_path, false).unwrap());
    let written = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(written, sample_config());
    assert_eq!(
        ConfigFile::load_from(&config_path).unwrap(),
        ConfigFile::default()
    );

    // Existing file is kept without overwrite
    std::fs::write(&config_path, "[streams]\nmax_streams = 3\n").unwrap();
    assert!(!ConfigFile::create_default_at(&config_path, false).unwrap());
    assert_eq!(
        ConfigFile::load_from(&config_path).unwrap().streams.max_streams,
        3
    );

    // Overwrite restores the defaults
    assert!(ConfigFile::create_default_at(&config_path, true).unwrap());
    assert_eq!(
        ConfigFile::load_from(&config_path).unwrap().streams.max_streams,
        8
    );
}

//! Compositor metrics
//!
//! Provides:
//! - Frame and blit counters
//! - Canvas reallocation and stream lifecycle counters
//! - Rolling average of command-recording time

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

/// Maximum number of samples to keep for rolling averages
const MAX_SAMPLES: usize = 120;

/// Metrics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompositorStats {
    /// Frames submitted
    pub frames_composed: u64,
    /// Blit commands recorded across all frames
    pub blits_issued: u64,
    /// Blits that were clipped to the canvas
    pub blits_clipped: u64,
    /// Times canvas memory had to grow
    pub canvas_reallocations: u64,
    /// Streams created
    pub streams_created: u64,
    /// Streams destroyed after a pending removal
    pub streams_removed: u64,
    /// Average command recording time in milliseconds
    pub avg_record_ms: f64,
    /// Worst recording time in the current window, milliseconds
    pub max_record_ms: f64,
    /// Seconds since the compositor was created
    pub session_secs: f64,
}

impl CompositorStats {
    /// Format stats as a single-line string
    pub fn format_line(&self) -> String {
        format!(
            "Frames: {} | Blits: {} ({} clipped) | Record: {:.2}ms avg {:.2}ms max | Reallocs: {} | Session: {:.1}s",
            self.frames_composed,
            self.blits_issued,
            self.blits_clipped,
            self.avg_record_ms,
            self.max_record_ms,
            self.canvas_reallocations,
            self.session_secs
        )
    }
}

/// Rolling average calculator for timing data
#[derive(Debug)]
struct RollingAverage {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl RollingAverage {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn add(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    fn max(&self) -> Duration {
        self.samples.iter().copied().max().unwrap_or(Duration::ZERO)
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Metrics collector
///
/// Counters are lock-free; only the timing window takes a lock, so a UI
/// thread can read stats while the compositor records.
#[derive(Debug)]
pub struct CompositorMetrics {
    record_times: RwLock<RollingAverage>,
    frames_composed: AtomicU64,
    blits_issued: AtomicU64,
    blits_clipped: AtomicU64,
    canvas_reallocations: AtomicU64,
    streams_created: AtomicU64,
    streams_removed: AtomicU64,
    start_time: Instant,
}

impl Default for CompositorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositorMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            record_times: RwLock::new(RollingAverage::new(MAX_SAMPLES)),
            frames_composed: AtomicU64::new(0),
            blits_issued: AtomicU64::new(0),
            blits_clipped: AtomicU64::new(0),
            canvas_reallocations: AtomicU64::new(0),
            streams_created: AtomicU64::new(0),
            streams_removed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one submitted frame
    pub fn record_frame(&self, record_time: Duration, blits: usize, clipped: usize) {
        self.record_times.write().add(record_time);
        self.frames_composed.fetch_add(1, Ordering::Relaxed);
        self.blits_issued.fetch_add(blits as u64, Ordering::Relaxed);
        self.blits_clipped.fetch_add(clipped as u64, Ordering::Relaxed);
    }

    pub fn record_canvas_reallocation(&self) {
        self.canvas_reallocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_created(&self) {
        self.streams_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_removed(&self) {
        self.streams_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> CompositorStats {
        let (avg, max) = {
            let times = self.record_times.read();
            (times.average(), times.max())
        };

        CompositorStats {
            frames_composed: self.frames_composed.load(Ordering::Relaxed),
            blits_issued: self.blits_issued.load(Ordering::Relaxed),
            blits_clipped: self.blits_clipped.load(Ordering::Relaxed),
            canvas_reallocations: self.canvas_reallocations.load(Ordering::Relaxed),
            streams_created: self.streams_created.load(Ordering::Relaxed),
            streams_removed: self.streams_removed.load(Ordering::Relaxed),
            avg_record_ms: as_ms(avg),
            max_record_ms: as_ms(max),
            session_secs: self.session_duration().as_secs_f64(),
        }
    }

    /// Get total frames composed
    pub fn frames_composed(&self) -> u64 {
        self.frames_composed.load(Ordering::Relaxed)
    }

    /// Get session duration
    pub fn session_duration(&self) -> Duration {
        Instant::now().duration_since(self.start_time)
    }
}

/// Create a shared metrics instance
pub fn create_metrics() -> Arc<CompositorMetrics> {
    Arc::new(CompositorMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut avg = RollingAverage::new(3);
        avg.add(Duration::from_millis(10));
        avg.add(Duration::from_millis(20));
        avg.add(Duration::from_millis(30));
        assert!((as_ms(avg.average()) - 20.0).abs() < 0.1);

        // Oldest sample drops out
        avg.add(Duration::from_millis(40));
        assert!((as_ms(avg.average()) - 30.0).abs() < 0.1);
        assert_eq!(avg.max(), Duration::from_millis(40));
    }

    #[test]
    fn test_frame_counters() {
        let metrics = CompositorMetrics::new();
        metrics.record_frame(Duration::from_millis(2), 4, 1);
        metrics.record_frame(Duration::from_millis(4), 4, 0);
        metrics.record_canvas_reallocation();

        let stats = metrics.stats();
        assert_eq!(stats.frames_composed, 2);
        assert_eq!(stats.blits_issued, 8);
        assert_eq!(stats.blits_clipped, 1);
        assert_eq!(stats.canvas_reallocations, 1);
        assert!((stats.avg_record_ms - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_format_line() {
        let stats = CompositorStats {
            frames_composed: 60,
            blits_issued: 120,
            ..Default::default()
        };
        let line = stats.format_line();
        assert!(line.contains("Frames: 60"));
        assert!(line.contains("Blits: 120"));
    }

    #[test]
    fn test_session_duration_in_stats() {
        let metrics = create_metrics();
        std::thread::sleep(Duration::from_millis(5));

        let stats = metrics.stats();
        assert!(stats.session_secs >= 0.005);
        assert!(metrics.session_duration() >= Duration::from_millis(5));
        assert!(stats.format_line().contains("Session: "));
    }
}

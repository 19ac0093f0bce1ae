use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::debug;

/// Number of taps kept in the sliding window.
pub const DEFAULT_CAPACITY: usize = 24;
/// Taps closer together than this (seconds) are treated as input bounce.
pub const DEFAULT_MIN_INTERVAL: f64 = 0.2;

/// Tap-based tempo estimator.
///
/// Keeps the most recent `capacity` tap instants and averages the intervals
/// between them. Taps that follow the previous counted tap by less than
/// `min_interval` seconds do not start or end an interval.
///
/// ```ignore
/// let mut tapper = TapTempo::new(24, 0.2);
/// if let Some(bpm) = tapper.record_tap(Instant::now()) {
///     println!("Detected tempo: {bpm}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TapTempo {
    capacity: usize,
    min_interval: f64,
    reset_gap: Option<f64>,
    taps: VecDeque<Instant>,
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MIN_INTERVAL)
    }
}

impl TapTempo {
    /// Create a new tap-tempo estimator.
    ///
    /// * `capacity` – number of most recent taps kept in the window.
    /// * `min_interval` – intervals shorter than this many seconds are ignored.
    pub fn new(capacity: usize, min_interval: f64) -> Self {
        assert!(capacity >= 2, "at least two taps are required to compute BPM");
        assert!(min_interval >= 0.0, "minimum interval must be non-negative");

        Self {
            capacity,
            min_interval,
            reset_gap: None,
            taps: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Clear the history whenever two taps are more than `gap` seconds apart.
    pub fn with_reset_gap(mut self, gap: Option<f64>) -> Self {
        self.reset_gap = gap.filter(|gap| *gap >= 0.0);
        self
    }

    /// Register a tap at the supplied instant.
    ///
    /// Returns the rounded BPM once at least one usable interval exists,
    /// otherwise `None`.
    pub fn record_tap(&mut self, now: Instant) -> Option<f64> {
        if let (Some(gap), Some(&last)) = (self.reset_gap, self.taps.back()) {
            if seconds_between(last, now) > gap {
                debug!("tap gap exceeded {gap:.2}s, starting a new window");
                self.taps.clear();
            }
        }

        self.taps.push_back(now);
        while self.taps.len() > self.capacity {
            self.taps.pop_front();
        }

        self.estimate()
    }

    /// Current estimate for the retained window, without recording a tap.
    pub fn estimate(&self) -> Option<f64> {
        if self.taps.len() < 2 {
            return None;
        }

        let intervals = self.intervals();
        if intervals.is_empty() {
            return None;
        }

        let avg_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if avg_interval <= 0.0 {
            return None;
        }

        let bpm = (60.0 / avg_interval).round();
        debug!(
            "{} intervals over {} taps, average {avg_interval:.4}s -> {bpm} BPM",
            intervals.len(),
            self.taps.len()
        );
        // Intervals over two minutes round down to 0, which is not a tempo.
        Some(bpm).filter(|bpm| *bpm > 0.0)
    }

    /// Intervals (seconds) between counted taps in the window.
    ///
    /// A tap that lands within `min_interval` of the last counted tap is a
    /// bounce: it is dropped and the next interval is measured from the
    /// last counted tap instead. This is not adjacent-pair filtering: taps
    /// at 0, 0.1 and 0.35 s give one 0.35 s interval, not one of 0.25 s.
    pub fn intervals(&self) -> Vec<f64> {
        let mut taps = self.taps.iter();
        let Some(&first) = taps.next() else {
            return Vec::new();
        };

        let mut anchor = first;
        let mut intervals = Vec::with_capacity(self.taps.len().saturating_sub(1));
        for &tap in taps {
            let delta = seconds_between(anchor, tap);
            if delta < self.min_interval {
                continue;
            }
            intervals.push(delta);
            anchor = tap;
        }
        intervals
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// Reset the tap history explicitly.
    pub fn reset(&mut self) {
        self.taps.clear();
    }
}

// Out-of-order instants collapse to zero and are then debounced.
fn seconds_between(earlier: Instant, later: Instant) -> f64 {
    later
        .checked_duration_since(earlier)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

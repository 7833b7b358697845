// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPS recording quality metrics.
//!
//! Pure computation over a `(lat, lon)` series and matching timestamps:
//! distance, top speed, speed spikes, stop segments and a jitter score.

use geo::{Distance, Haversine, Point};

/// Thresholds that drive spike and stop detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Segment speed at or above this counts as a spike (~43 km/h)
    pub spike_speed_mps: f64,
    /// Segment speed at or below this counts as stopped
    pub stop_speed_mps: f64,
    /// A stop shorter than this is ignored
    pub stop_min_duration_s: i64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            spike_speed_mps: 12.0,
            stop_speed_mps: 0.6,
            stop_min_duration_s: 10,
        }
    }
}

/// Result of [`compute_quality`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub point_count: u32,
    pub duration_s: i64,
    pub distance_m: f64,
    pub max_speed_mps: f64,
    pub spike_count: u32,
    pub stopped_time_s: i64,
    pub stop_segments: u32,
    pub jitter_score: f64,
}

/// Great-circle distance in meters between two `(lat, lon)` pairs.
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    Haversine.distance(Point::new(a.1, a.0), Point::new(b.1, b.0))
}

/// Tracks the stop currently in progress.
#[derive(Default)]
struct StopTracker {
    in_stop: bool,
    current_s: i64,
    stopped_time_s: i64,
    segments: u32,
}

impl StopTracker {
    fn observe(&mut self, speed: f64, dt: i64, thresholds: &QualityThresholds) {
        if speed <= thresholds.stop_speed_mps {
            self.current_s += dt;
            self.in_stop = true;
        } else if self.in_stop {
            self.commit(thresholds);
        }
    }

    fn commit(&mut self, thresholds: &QualityThresholds) {
        if self.current_s >= thresholds.stop_min_duration_s {
            self.stopped_time_s += self.current_s;
            self.segments += 1;
        }
        self.current_s = 0;
        self.in_stop = false;
    }

    fn finish(mut self, thresholds: &QualityThresholds) -> (i64, u32) {
        if self.in_stop {
            self.commit(thresholds);
        }
        (self.stopped_time_s, self.segments)
    }
}

/// Compute quality metrics for a GPS series.
///
/// `latlons` and `times` are parallel; extra entries in the longer slice are
/// ignored. Pairs whose time delta is not positive are skipped.
pub fn compute_quality(
    latlons: &[(f64, f64)],
    times: &[i64],
    thresholds: &QualityThresholds,
) -> QualityReport {
    let n = latlons.len().min(times.len());
    if n < 2 {
        return QualityReport {
            point_count: n as u32,
            ..Default::default()
        };
    }

    let mut distance_m = 0.0;
    let mut max_speed_mps: f64 = 0.0;
    let mut spike_count = 0;
    let mut stops = StopTracker::default();
    let mut speeds = Vec::with_capacity(n - 1);

    for i in 1..n {
        let dt = times[i] - times[i - 1];
        if dt <= 0 {
            continue;
        }

        let d = haversine_m(latlons[i - 1], latlons[i]);
        let v = d / dt as f64;

        distance_m += d;
        speeds.push(v);
        max_speed_mps = max_speed_mps.max(v);
        if v >= thresholds.spike_speed_mps {
            spike_count += 1;
        }
        stops.observe(v, dt, thresholds);
    }

    let (stopped_time_s, stop_segments) = stops.finish(thresholds);

    let window = &times[..n];
    let duration_s = match (window.iter().max(), window.iter().min()) {
        (Some(max), Some(min)) => max - min,
        _ => 0,
    };

    let jitter_score = if speeds.len() >= 2 {
        let total: f64 = speeds.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        total / (speeds.len() - 1) as f64
    } else {
        0.0
    };

    QualityReport {
        point_count: n as u32,
        duration_s,
        distance_m,
        max_speed_mps,
        spike_count,
        stopped_time_s,
        stop_segments,
        jitter_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Roughly 1.11 m per 0.00001 degree of latitude.
    fn north(lat: f64, meters: f64) -> f64 {
        lat + meters / 111_195.0
    }

    #[test]
    fn test_fewer_than_two_points_is_empty() {
        let t = QualityThresholds::default();
        assert_eq!(compute_quality(&[], &[], &t).point_count, 0);

        let report = compute_quality(&[(37.0, -122.0)], &[0], &t);
        assert_eq!(report.point_count, 1);
        assert_eq!(report.distance_m, 0.0);
        assert_eq!(report.duration_s, 0);
    }

    #[test]
    fn test_steady_run_has_no_spikes_or_stops() {
        // 3 m/s for 60 seconds
        let mut latlons = Vec::new();
        let mut times = Vec::new();
        let mut lat = 37.0;
        for i in 0..=60 {
            latlons.push((lat, -122.0));
            times.push(i);
            lat = north(lat, 3.0);
        }

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.point_count, 61);
        assert_eq!(report.duration_s, 60);
        assert!((report.distance_m - 180.0).abs() < 1.0, "{}", report.distance_m);
        assert!((report.max_speed_mps - 3.0).abs() < 0.05);
        assert_eq!(report.spike_count, 0);
        assert_eq!(report.stop_segments, 0);
        assert!(report.jitter_score < 0.05);
    }

    #[test]
    fn test_detects_spike() {
        let latlons = [
            (37.0, -122.0),
            (north(37.0, 3.0), -122.0),
            (north(37.0, 103.0), -122.0), // 100 m in 1 s
            (north(37.0, 106.0), -122.0),
        ];
        let times = [0, 1, 2, 3];

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.spike_count, 1);
        assert!(report.max_speed_mps > 90.0);
        assert!(report.jitter_score > 50.0);
    }

    #[test]
    fn test_stop_segment_counted_when_long_enough() {
        // Move, stand still for 20 s, move again
        let mut latlons = vec![(37.0, -122.0), (north(37.0, 5.0), -122.0)];
        let mut times = vec![0, 1];
        for t in [11, 21] {
            latlons.push((north(37.0, 5.0), -122.0));
            times.push(t);
        }
        latlons.push((north(37.0, 10.0), -122.0));
        times.push(22);

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.stop_segments, 1);
        assert_eq!(report.stopped_time_s, 20);
    }

    #[test]
    fn test_short_stop_is_ignored() {
        let latlons = [
            (37.0, -122.0),
            (north(37.0, 5.0), -122.0),
            (north(37.0, 5.0), -122.0),
            (north(37.0, 10.0), -122.0),
        ];
        let times = [0, 1, 6, 7];

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.stop_segments, 0);
        assert_eq!(report.stopped_time_s, 0);
    }

    #[test]
    fn test_trailing_stop_is_committed() {
        let latlons = [
            (37.0, -122.0),
            (north(37.0, 5.0), -122.0),
            (north(37.0, 5.0), -122.0),
        ];
        let times = [0, 1, 31];

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.stop_segments, 1);
        assert_eq!(report.stopped_time_s, 30);
    }

    #[test]
    fn test_non_increasing_time_pairs_are_skipped() {
        let latlons = [
            (37.0, -122.0),
            (north(37.0, 500.0), -122.0), // same timestamp: ignored
            (north(37.0, 503.0), -122.0),
        ];
        let times = [0, 0, 1];

        let report = compute_quality(&latlons, &times, &QualityThresholds::default());
        assert_eq!(report.spike_count, 0);
        assert!((report.distance_m - 3.0).abs() < 0.1);
        assert_eq!(report.duration_s, 1);
    }

    #[test]
    fn test_custom_thresholds() {
        let latlons = [
            (37.0, -122.0),
            (north(37.0, 5.0), -122.0),
            (north(37.0, 10.0), -122.0),
        ];
        let times = [0, 1, 2];
        let thresholds = QualityThresholds {
            spike_speed_mps: 4.0,
            ..Default::default()
        };

        let report = compute_quality(&latlons, &times, &thresholds);
        assert_eq!(report.spike_count, 2);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Display formatting and track bounds.

use chrono::{DateTime, Local};
use geo::{BoundingRect, LineString};
use geojson::{Feature, Value};

/// Placeholder for missing values.
pub const EMPTY: &str = "—";

/// `"1h 5m"` from an hour up, `"4m 07s"` below.
pub fn format_duration(total_seconds: Option<i64>) -> String {
    let Some(total) = total_seconds else {
        return EMPTY.to_string();
    };
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m {:02}s", mins, secs)
    }
}

/// Meters as kilometers with two decimals.
pub fn format_distance(meters: Option<f64>) -> String {
    match meters {
        Some(m) => format!("{:.2} km", m / 1000.0),
        None => EMPTY.to_string(),
    }
}

/// RFC3339 timestamp in local time; unparseable input is shown as-is.
pub fn format_date(value: Option<&str>) -> String {
    match value.filter(|v| !v.is_empty()) {
        None => EMPTY.to_string(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

/// South-west and north-east corners of a track, as `(lat, lon)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBounds {
    pub south_west: (f64, f64),
    pub north_east: (f64, f64),
}

/// Bounds of a track feature's LineString. `None` without geometry.
pub fn track_bounds(feature: &Feature) -> Option<TrackBounds> {
    let Value::LineString(positions) = &feature.geometry.as_ref()?.value else {
        return None;
    };

    let line: LineString<f64> = positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| (p[0], p[1]))
        .collect::<Vec<_>>()
        .into();
    let rect = line.bounding_rect()?;

    Some(TrackBounds {
        south_west: (rect.min().y, rect.min().x),
        north_east: (rect.max().y, rect.max().x),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::Geometry;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "—");
        assert_eq!(format_duration(Some(0)), "0m 00s");
        assert_eq!(format_duration(Some(427)), "7m 07s");
        assert_eq!(format_duration(Some(3600)), "1h 0m");
        assert_eq!(format_duration(Some(5_430)), "1h 30m");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(None), "—");
        assert_eq!(format_distance(Some(0.0)), "0.00 km");
        assert_eq!(format_distance(Some(10_234.0)), "10.23 km");
    }

    #[test]
    fn test_format_date_falls_back_to_raw() {
        assert_eq!(format_date(None), "—");
        assert_eq!(format_date(Some("")), "—");
        assert_eq!(format_date(Some("yesterday")), "yesterday");
        assert_ne!(format_date(Some("2026-03-01T07:30:00Z")), "2026-03-01T07:30:00Z");
    }

    #[test]
    fn test_track_bounds() {
        let feature = Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                vec![-122.1, 37.4],
                vec![-122.3, 37.2],
                vec![-122.2, 37.5],
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        };

        let bounds = track_bounds(&feature).unwrap();
        assert_eq!(bounds.south_west, (37.2, -122.3));
        assert_eq!(bounds.north_east, (37.5, -122.1));
    }

    #[test]
    fn test_track_bounds_without_geometry() {
        let feature = Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: None,
            foreign_members: None,
        };
        assert_eq!(track_bounds(&feature), None);
    }
}

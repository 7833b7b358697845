// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plain-text panels for the terminal dashboard.

use super::format::{format_date, format_distance, format_duration, track_bounds, EMPTY};
use super::state::Dashboard;
use std::fmt::Write;

/// Activity list with the selected entry marked.
pub fn render_activity_list(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    if dashboard.activities.is_empty() {
        out.push_str("No activities yet. Run `sync` to pull them from Strava.\n");
        return out;
    }

    for activity in &dashboard.activities {
        let marker = if dashboard.selected_id() == Some(activity.id) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{} {:>12}  {:<28}  {:<10}  {:>9}  {:>8}  {}",
            marker,
            activity.id,
            truncate(activity.name.as_deref().unwrap_or("Untitled activity"), 28),
            activity.sport_type.as_deref().unwrap_or(EMPTY),
            format_distance(activity.distance_m),
            format_duration(activity.moving_time_s),
            format_date(activity.start_date.as_deref()),
        );
    }
    out
}

/// Track and quality panels for the selected activity.
pub fn render_details(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    let Some(activity) = dashboard.selected_activity() else {
        out.push_str("Select an activity to see its track and quality report.\n");
        return out;
    };

    let _ = writeln!(
        out,
        "{} ({})",
        activity.name.as_deref().unwrap_or("Untitled activity"),
        activity.sport_type.as_deref().unwrap_or(EMPTY)
    );
    let _ = writeln!(
        out,
        "  {} · {} · {}",
        format_date(activity.start_date.as_deref()),
        format_distance(activity.distance_m),
        format_duration(activity.moving_time_s)
    );

    out.push_str("\nTrack\n");
    match (&dashboard.track, &dashboard.track_error) {
        (Some(track), _) => {
            let points = track
                .properties
                .as_ref()
                .and_then(|p| p.get("point_count"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let _ = writeln!(out, "  points: {}", points);
            match track_bounds(track) {
                Some(b) => {
                    let _ = writeln!(
                        out,
                        "  bounds: SW {:.5},{:.5}  NE {:.5},{:.5}",
                        b.south_west.0, b.south_west.1, b.north_east.0, b.north_east.1
                    );
                }
                None => out.push_str("  bounds: —\n"),
            }
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "  error: {}", err);
        }
        (None, None) => out.push_str("  No track loaded.\n"),
    }

    out.push_str("\nQuality\n");
    match (&dashboard.quality, &dashboard.quality_error) {
        (Some(q), _) => {
            let _ = writeln!(out, "  points:        {}", q.point_count);
            let _ = writeln!(out, "  duration:      {}", format_duration(Some(q.duration_s)));
            let _ = writeln!(out, "  GPS distance:  {}", format_distance(Some(q.distance_m_gps)));
            let _ = writeln!(out, "  max speed:     {:.1} km/h", q.max_speed_kmh);
            let _ = writeln!(out, "  spikes:        {}", q.spike_count);
            let _ = writeln!(
                out,
                "  stopped:       {} in {} segments",
                format_duration(Some(q.stopped_time_s)),
                q.stop_segments
            );
            let _ = writeln!(out, "  jitter score:  {:.3}", q.jitter_score);
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "  error: {}", err);
        }
        (None, None) => out.push_str("  No quality report loaded.\n"),
    }

    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    t.push('…');
    t
}

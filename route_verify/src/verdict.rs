//! Verdict aggregation, text report and exit codes.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::altitude::AltitudeVerdict;
use crate::geometry::GeometryVerdict;
use crate::{Track, VerifyConfig};

pub const EXIT_EQUAL: u8 = 0;
pub const EXIT_NOT_EQUAL: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackSummary {
    pub points: usize,
    pub length_m: f64,
}

impl TrackSummary {
    pub fn of(track: &Track) -> Self {
        Self {
            points: track.len(),
            length_m: track.length_m(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub track_a: TrackSummary,
    pub track_b: TrackSummary,
    pub buffer_m: f64,
    pub altitude_interval_m: f64,
    pub altitude_tolerance_m: f64,
    pub comparison_step_m: f64,
    pub geometry: GeometryVerdict,
    pub altitude: AltitudeVerdict,
    pub overall_equal: bool,
}

impl ComparisonResult {
    pub fn new(
        track_a: TrackSummary,
        track_b: TrackSummary,
        config: &VerifyConfig,
        geometry: GeometryVerdict,
        altitude: AltitudeVerdict,
    ) -> Self {
        let overall_equal = geometry.equal && altitude.within_tolerance;
        Self {
            track_a,
            track_b,
            buffer_m: config.buffer_m,
            altitude_interval_m: config.altitude_interval_m,
            altitude_tolerance_m: config.effective_altitude_tolerance(),
            comparison_step_m: config.comparison_step_m,
            geometry,
            altitude,
            overall_equal,
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.overall_equal {
            EXIT_EQUAL
        } else {
            EXIT_NOT_EQUAL
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReportOptions {
    /// Append the first `n` altitude grid rows as a table.
    pub table_rows: Option<usize>,
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

fn yes_no(ok: bool) -> &'static str {
    if ok {
        "yes"
    } else {
        "no"
    }
}

fn meters(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2} m", value)
    } else {
        "n/a".to_string()
    }
}

/// Render the line-oriented report.
///
/// The `Routes geometrically equal:`, `Altitudes within tolerance` and
/// `Overall Result:` lines are stable and meant to be grepped.
pub fn render_report(result: &ComparisonResult, options: &ReportOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Track A: {} points, {:.1} m",
        result.track_a.points, result.track_a.length_m
    );
    let _ = writeln!(
        out,
        "Track B: {} points, {:.1} m",
        result.track_b.points, result.track_b.length_m
    );
    out.push('\n');

    let geo = &result.geometry;
    let _ = writeln!(out, "Geometry (buffer {:.2} m)", result.buffer_m);
    let _ = writeln!(
        out,
        "  A within buffer of B: {}",
        yes_no(geo.a_contained_in_buffer_of_b)
    );
    let _ = writeln!(
        out,
        "  B within buffer of A: {}",
        yes_no(geo.b_contained_in_buffer_of_a)
    );
    let _ = writeln!(out, "Routes geometrically equal: {}", mark(geo.equal));
    out.push('\n');

    let alt = &result.altitude;
    let _ = writeln!(
        out,
        "Altitude (interval {:.0} m, grid {:.0} m, {} comparisons)",
        result.altitude_interval_m,
        result.comparison_step_m,
        alt.per_sample_differences.len()
    );
    let _ = writeln!(out, "  Max difference: {}", meters(alt.max_diff_m));
    let _ = writeln!(out, "  Avg difference: {}", meters(alt.avg_diff_m));
    let _ = writeln!(
        out,
        "Altitudes within tolerance ({:.2} m): {}",
        result.altitude_tolerance_m,
        mark(alt.within_tolerance)
    );

    if let Some(n) = options.table_rows {
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>12} {:>12} {:>12} {:>10}",
            "distance_m", "elev_a_m", "elev_b_m", "diff_m"
        );
        for row in alt.per_sample_differences.iter().take(n) {
            let _ = writeln!(
                out,
                "{:>12.1} {:>12.2} {:>12.2} {:>10.2}",
                row.distance_m, row.elevation_a_m, row.elevation_b_m, row.abs_diff_m
            );
        }
        let remaining = alt.per_sample_differences.len().saturating_sub(n);
        if remaining > 0 {
            let _ = writeln!(out, "  ... {} more rows", remaining);
        }
    }

    out.push('\n');
    let _ = writeln!(out, "Overall Result: {}", mark(result.overall_equal));
    out
}

//! Altitude profile comparison on a fixed distance grid.

use serde::{Deserialize, Serialize};

use crate::resample::{AltitudeProfile, AltitudeSample};
use crate::{VerifyError, MAX_GRID_SAMPLES};

const GRID_SLACK_M: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AltitudeDifference {
    pub distance_m: f64,
    pub elevation_a_m: f64,
    pub elevation_b_m: f64,
    pub abs_diff_m: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AltitudeVerdict {
    pub per_sample_differences: Vec<AltitudeDifference>,
    pub max_diff_m: f64,
    pub avg_diff_m: f64,
    pub within_tolerance: bool,
}

impl AltitudeVerdict {
    fn vacuous() -> Self {
        Self {
            per_sample_differences: Vec::new(),
            max_diff_m: 0.0,
            avg_diff_m: 0.0,
            within_tolerance: true,
        }
    }

    fn incomparable() -> Self {
        Self {
            per_sample_differences: Vec::new(),
            max_diff_m: f64::INFINITY,
            avg_diff_m: f64::INFINITY,
            within_tolerance: false,
        }
    }
}

/// Forward-only scan over a distance-sorted profile.
///
/// Yields the elevation of the last sample at or before each requested
/// distance; requested distances must never decrease.
struct ProfileCursor<'a> {
    samples: &'a [AltitudeSample],
    idx: usize,
    last_target: f64,
}

impl<'a> ProfileCursor<'a> {
    fn new(samples: &'a [AltitudeSample]) -> Self {
        Self {
            samples,
            idx: 0,
            last_target: f64::NEG_INFINITY,
        }
    }

    fn elevation_at(&mut self, distance_m: f64) -> f64 {
        debug_assert!(
            distance_m >= self.last_target,
            "cursor moved backwards: {} < {}",
            distance_m,
            self.last_target
        );
        self.last_target = distance_m;
        while self.idx + 1 < self.samples.len()
            && self.samples[self.idx + 1].distance_m <= distance_m
        {
            debug_assert!(self.samples[self.idx].distance_m <= self.samples[self.idx + 1].distance_m);
            self.idx += 1;
        }
        self.samples[self.idx].elevation_m
    }
}

/// Compare two profiles over their overlapping distance range.
///
/// Grid points are `0, step_m, 2 * step_m, ...` up to the shorter profile's
/// length; at each one the nearest preceding sample of each profile is used.
pub fn compare_altitude(
    a: &AltitudeProfile,
    b: &AltitudeProfile,
    tolerance_m: f64,
    step_m: f64,
) -> Result<AltitudeVerdict, VerifyError> {
    if !step_m.is_finite() || step_m <= 0.0 {
        return Err(VerifyError::InvalidParameter(format!(
            "comparison step must be > 0, got {}",
            step_m
        )));
    }
    let (end_a, end_b) = match (a.last_distance(), b.last_distance()) {
        (None, None) => return Ok(AltitudeVerdict::vacuous()),
        (Some(ea), Some(eb)) => (ea, eb),
        _ => return Ok(AltitudeVerdict::incomparable()),
    };
    let max_distance = end_a.min(end_b);
    if max_distance / step_m > MAX_GRID_SAMPLES as f64 {
        return Err(VerifyError::InvalidParameter(format!(
            "comparison step {} m is too fine for {:.0} m of overlap (limit {} rows)",
            step_m, max_distance, MAX_GRID_SAMPLES
        )));
    }

    let mut cursor_a = ProfileCursor::new(&a.samples);
    let mut cursor_b = ProfileCursor::new(&b.samples);
    let mut diffs = Vec::new();
    let mut k = 0u64;
    loop {
        let distance = k as f64 * step_m;
        if distance > max_distance + GRID_SLACK_M {
            break;
        }
        let ea = cursor_a.elevation_at(distance);
        let eb = cursor_b.elevation_at(distance);
        diffs.push(AltitudeDifference {
            distance_m: distance,
            elevation_a_m: ea,
            elevation_b_m: eb,
            abs_diff_m: (ea - eb).abs(),
        });
        k += 1;
    }

    let max_diff = diffs.iter().map(|d| d.abs_diff_m).fold(0.0, f64::max);
    let avg_diff = diffs.iter().map(|d| d.abs_diff_m).sum::<f64>() / diffs.len() as f64;
    Ok(AltitudeVerdict {
        per_sample_differences: diffs,
        max_diff_m: max_diff,
        avg_diff_m: avg_diff,
        within_tolerance: max_diff <= tolerance_m,
    })
}

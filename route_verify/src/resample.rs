//! Distance-domain altitude resampling.

use serde::{Deserialize, Serialize};

use crate::{Track, VerifyError, MAX_GRID_SAMPLES};

/// Shortfall below which the last grid sample already counts as the track end.
const TERMINAL_EPS_M: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AltitudeSample {
    pub distance_m: f64,
    pub elevation_m: f64,
    pub longitude: f64,
    pub latitude: f64,
}

/// Samples ordered by non-decreasing distance, starting at 0 and ending at the
/// track's total length.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AltitudeProfile {
    pub samples: Vec<AltitudeSample>,
}

impl AltitudeProfile {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last_distance(&self) -> Option<f64> {
        self.samples.last().map(|s| s.distance_m)
    }

    pub fn is_monotonic(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].distance_m <= w[1].distance_m)
    }
}

/// Resample `track` every `interval_m` meters of travelled distance.
///
/// Elevation and position are linearly interpolated inside the segment that
/// contains each grid distance. Missing elevations read as 0. The true final
/// point is appended when the grid does not land on the total length.
pub fn resample_altitude(track: &Track, interval_m: f64) -> Result<AltitudeProfile, VerifyError> {
    if !interval_m.is_finite() || interval_m <= 0.0 {
        return Err(VerifyError::InvalidParameter(format!(
            "altitude interval must be > 0, got {}",
            interval_m
        )));
    }
    let first = match track.points.first() {
        Some(p) => p,
        None => return Ok(AltitudeProfile::default()),
    };
    let length = track.length_m();
    if length / interval_m > MAX_GRID_SAMPLES as f64 {
        return Err(VerifyError::InvalidParameter(format!(
            "altitude interval {} m is too fine for a {:.0} m track (limit {} samples)",
            interval_m, length, MAX_GRID_SAMPLES
        )));
    }

    let mut samples = vec![AltitudeSample {
        distance_m: 0.0,
        elevation_m: first.elevation_or_zero(),
        longitude: first.longitude,
        latitude: first.latitude,
    }];
    let mut total = 0.0;
    let mut step = 1u64;

    for w in track.points.windows(2) {
        let (p0, p1) = (&w[0], &w[1]);
        let segment = p0.distance_to(p1);
        if segment <= 0.0 {
            continue;
        }
        let start = total;
        let end = total + segment;
        let mut next = step as f64 * interval_m;
        while next <= end {
            let ratio = (next - start) / segment;
            let (e0, e1) = (p0.elevation_or_zero(), p1.elevation_or_zero());
            samples.push(AltitudeSample {
                distance_m: next,
                elevation_m: e0 + (e1 - e0) * ratio,
                longitude: p0.longitude + (p1.longitude - p0.longitude) * ratio,
                latitude: p0.latitude + (p1.latitude - p0.latitude) * ratio,
            });
            step += 1;
            next = step as f64 * interval_m;
        }
        total = end;
    }

    let reached = samples.last().map(|s| s.distance_m).unwrap_or(0.0);
    if total - reached > TERMINAL_EPS_M {
        let last = track.points.last().unwrap_or(first);
        samples.push(AltitudeSample {
            distance_m: total,
            elevation_m: last.elevation_or_zero(),
            longitude: last.longitude,
            latitude: last.latitude,
        });
    }

    Ok(AltitudeProfile { samples })
}

//! Core route equivalence verification implemented in Rust.
//!
//! Two tracks are "the same route" when each lies inside the other's tolerance
//! corridor and their elevation profiles agree within an altitude tolerance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod altitude;
pub mod extract;
pub mod geometry;
pub mod resample;
pub mod verdict;

pub use altitude::{compare_altitude, AltitudeDifference, AltitudeVerdict};
pub use extract::parse_track;
pub use geometry::{compare_geometry, GeometryVerdict};
pub use resample::{resample_altitude, AltitudeProfile, AltitudeSample};
pub use verdict::{
    render_report, ComparisonResult, ReportOptions, TrackSummary, EXIT_EQUAL, EXIT_FAILURE,
    EXIT_NOT_EQUAL,
};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Upper bound on resampled or compared grid points per profile; a finer
/// interval or step for the track length is rejected as `InvalidParameter`.
pub const MAX_GRID_SAMPLES: usize = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("failed to parse input: {0}")]
    InputParse(String),
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("no track found in input")]
    NoTrackFound,
    #[error("track {track} has {points} distinct point(s); at least 2 are needed to form a line")]
    DegenerateGeometry { track: char, points: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl VerifyError {
    /// Process exit code for a comparison that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            VerifyError::NoTrackFound => EXIT_NOT_EQUAL,
            _ => EXIT_FAILURE,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        Self {
            longitude,
            latitude,
            elevation,
        }
    }

    /// Elevation with absent values read as sea level.
    pub fn elevation_or_zero(&self) -> f64 {
        self.elevation.unwrap_or(0.0)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

/// Ordered sequence of points in traversal order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub points: Vec<Point>,
}

impl Track {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total path length in meters.
    pub fn length_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.points.first()?;
        let init = Bounds {
            min_lon: first.longitude,
            min_lat: first.latitude,
            max_lon: first.longitude,
            max_lat: first.latitude,
        };
        Some(self.points.iter().fold(init, |b, p| Bounds {
            min_lon: b.min_lon.min(p.longitude),
            min_lat: b.min_lat.min(p.latitude),
            max_lon: b.max_lon.max(p.longitude),
            max_lat: b.max_lat.max(p.latitude),
        }))
    }
}

impl From<Vec<Point>> for Track {
    fn from(points: Vec<Point>) -> Self {
        Track::new(points)
    }
}

/// Tolerances for one verification run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifyConfig {
    /// Corridor half-width around each track, meters.
    pub buffer_m: f64,
    /// Spacing of the distance-domain altitude resampling, meters.
    pub altitude_interval_m: f64,
    /// Maximum allowed elevation difference; falls back to `buffer_m`.
    pub altitude_tolerance_m: Option<f64>,
    /// Step of the grid the two altitude profiles are compared on, meters.
    pub comparison_step_m: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            buffer_m: 1.0,
            altitude_interval_m: 100.0,
            altitude_tolerance_m: None,
            comparison_step_m: 100.0,
        }
    }
}

impl VerifyConfig {
    pub fn effective_altitude_tolerance(&self) -> f64 {
        self.altitude_tolerance_m.unwrap_or(self.buffer_m)
    }

    pub fn validate(&self) -> Result<(), VerifyError> {
        if !self.buffer_m.is_finite() || self.buffer_m < 0.0 {
            return Err(VerifyError::InvalidParameter(format!(
                "buffer distance must be a finite value >= 0, got {}",
                self.buffer_m
            )));
        }
        if !self.altitude_interval_m.is_finite() || self.altitude_interval_m <= 0.0 {
            return Err(VerifyError::InvalidParameter(format!(
                "altitude interval must be > 0, got {}",
                self.altitude_interval_m
            )));
        }
        if !self.comparison_step_m.is_finite() || self.comparison_step_m <= 0.0 {
            return Err(VerifyError::InvalidParameter(format!(
                "comparison step must be > 0, got {}",
                self.comparison_step_m
            )));
        }
        let tol = self.effective_altitude_tolerance();
        if tol.is_nan() || tol < 0.0 {
            return Err(VerifyError::InvalidParameter(format!(
                "altitude tolerance must be >= 0, got {}",
                tol
            )));
        }
        Ok(())
    }
}

/// Great-circle distance in meters between two lat/lon pairs given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Run the full verification of `a` against `b`.
pub fn compare_tracks(
    a: &Track,
    b: &Track,
    config: &VerifyConfig,
) -> Result<ComparisonResult, VerifyError> {
    config.validate()?;
    if a.is_empty() || b.is_empty() {
        return Err(VerifyError::NoTrackFound);
    }

    let geometry = compare_geometry(a, b, config.buffer_m)?;

    let profile_a = resample_altitude(a, config.altitude_interval_m)?;
    let profile_b = resample_altitude(b, config.altitude_interval_m)?;
    let altitude = compare_altitude(
        &profile_a,
        &profile_b,
        config.effective_altitude_tolerance(),
        config.comparison_step_m,
    )?;

    Ok(ComparisonResult::new(
        TrackSummary::of(a),
        TrackSummary::of(b),
        config,
        geometry,
        altitude,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64, f64)]) -> Track {
        points
            .iter()
            .map(|&(lon, lat, ele)| Point::new(lon, lat, Some(ele)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_haversine_distance() {
        let dist = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((dist - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn test_track_length_sums_segments() {
        let track = line(&[(0.0, 0.0, 0.0), (0.0, 0.001, 0.0), (0.0, 0.002, 0.0)]);
        let direct = haversine_distance(0.0, 0.0, 0.002, 0.0);
        assert!((track.length_m() - direct).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_union_and_center() {
        let a = line(&[(1.0, 2.0, 0.0), (3.0, 4.0, 0.0)]).bounds().unwrap();
        let b = line(&[(-1.0, 3.0, 0.0)]).bounds().unwrap();
        let u = a.union(&b);
        assert_eq!(u.min_lon, -1.0);
        assert_eq!(u.max_lat, 4.0);
        assert_eq!(u.center(), (1.0, 3.0));
        assert!(Track::default().bounds().is_none());
    }

    #[test]
    fn test_altitude_tolerance_defaults_to_buffer() {
        let config = VerifyConfig {
            buffer_m: 7.5,
            ..VerifyConfig::default()
        };
        assert_eq!(config.effective_altitude_tolerance(), 7.5);
        let config = VerifyConfig {
            altitude_tolerance_m: Some(2.0),
            ..config
        };
        assert_eq!(config.effective_altitude_tolerance(), 2.0);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let bad = [
            VerifyConfig {
                buffer_m: -1.0,
                ..VerifyConfig::default()
            },
            VerifyConfig {
                altitude_interval_m: 0.0,
                ..VerifyConfig::default()
            },
            VerifyConfig {
                comparison_step_m: f64::NAN,
                ..VerifyConfig::default()
            },
            VerifyConfig {
                altitude_tolerance_m: Some(-0.5),
                ..VerifyConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(VerifyError::InvalidParameter(_))
            ));
        }
        assert!(VerifyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: VerifyConfig = serde_json::from_str(r#"{"buffer_m": 5.0}"#).unwrap();
        assert_eq!(config.buffer_m, 5.0);
        assert_eq!(config.altitude_interval_m, 100.0);
        assert_eq!(config.altitude_tolerance_m, None);
    }

    #[test]
    fn test_compare_tracks_rejects_empty_track() {
        let a = line(&[(0.0, 0.0, 0.0), (0.0, 0.001, 0.0)]);
        let err = compare_tracks(&a, &Track::default(), &VerifyConfig::default()).unwrap_err();
        assert_eq!(err, VerifyError::NoTrackFound);
        assert_eq!(err.exit_code(), EXIT_NOT_EQUAL);
    }

    #[test]
    fn test_compare_tracks_single_point_is_degenerate() {
        let a = line(&[(0.0, 0.0, 0.0)]);
        let b = line(&[(0.0, 0.0, 0.0), (0.0, 0.001, 0.0)]);
        let err = compare_tracks(&a, &b, &VerifyConfig::default()).unwrap_err();
        assert_eq!(
            err,
            VerifyError::DegenerateGeometry {
                track: 'A',
                points: 1
            }
        );
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}

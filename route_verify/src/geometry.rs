//! Corridor containment: is each track inside the other's buffered path?

use geo::{Buffer, Coord, LineString, Relate};
use serde::{Deserialize, Serialize};

use crate::{Bounds, Track, VerifyError, EARTH_RADIUS_M};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeometryVerdict {
    pub a_contained_in_buffer_of_b: bool,
    pub b_contained_in_buffer_of_a: bool,
    pub equal: bool,
}

impl GeometryVerdict {
    pub fn new(a_in_b: bool, b_in_a: bool) -> Self {
        Self {
            a_contained_in_buffer_of_b: a_in_b,
            b_contained_in_buffer_of_a: b_in_a,
            equal: a_in_b && b_in_a,
        }
    }
}

/// Equirectangular projection to meters around a fixed origin.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LocalFrame {
    lon0: f64,
    lat0: f64,
    cos_lat0: f64,
}

impl LocalFrame {
    pub(crate) fn centered_on(bounds: &Bounds) -> Self {
        let (lon0, lat0) = bounds.center();
        Self {
            lon0,
            lat0,
            cos_lat0: lat0.to_radians().cos(),
        }
    }

    pub(crate) fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        Coord {
            x: EARTH_RADIUS_M * (lon - self.lon0).to_radians() * self.cos_lat0,
            y: EARTH_RADIUS_M * (lat - self.lat0).to_radians(),
        }
    }

    /// Project a track into a line, collapsing repeated coordinates.
    pub(crate) fn line_string(
        &self,
        track: &Track,
        label: char,
    ) -> Result<LineString<f64>, VerifyError> {
        let mut coords: Vec<Coord<f64>> = track
            .points
            .iter()
            .map(|p| self.project(p.longitude, p.latitude))
            .collect();
        coords.dedup();
        if coords.len() < 2 {
            return Err(VerifyError::DegenerateGeometry {
                track: label,
                points: coords.len(),
            });
        }
        Ok(LineString::new(coords))
    }
}

/// Buffer each track by `buffer_m` meters and test mutual containment.
///
/// A zero buffer degenerates to testing each line against the other line.
pub fn compare_geometry(
    a: &Track,
    b: &Track,
    buffer_m: f64,
) -> Result<GeometryVerdict, VerifyError> {
    if !buffer_m.is_finite() || buffer_m < 0.0 {
        return Err(VerifyError::InvalidParameter(format!(
            "buffer distance must be a finite value >= 0, got {}",
            buffer_m
        )));
    }
    let bounds = match (a.bounds(), b.bounds()) {
        (Some(ba), Some(bb)) => ba.union(&bb),
        (None, _) => return Err(VerifyError::DegenerateGeometry { track: 'A', points: 0 }),
        (_, None) => return Err(VerifyError::DegenerateGeometry { track: 'B', points: 0 }),
    };
    let frame = LocalFrame::centered_on(&bounds);
    let line_a = frame.line_string(a, 'A')?;
    let line_b = frame.line_string(b, 'B')?;

    Ok(GeometryVerdict::new(
        within_corridor(&line_a, &line_b, buffer_m),
        within_corridor(&line_b, &line_a, buffer_m),
    ))
}

fn within_corridor(line: &LineString<f64>, other: &LineString<f64>, buffer_m: f64) -> bool {
    if buffer_m == 0.0 {
        return line.relate(other).is_within();
    }
    let corridor = other.buffer(buffer_m);
    line.relate(&corridor).is_within()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn track(coords: &[(f64, f64)]) -> Track {
        coords
            .iter()
            .map(|&(lon, lat)| Point::new(lon, lat, None))
            .collect::<Vec<_>>()
            .into()
    }

    /// Degrees of longitude spanning `meters` at the equator.
    fn lon_offset(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn test_identical_tracks_are_equal() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let verdict = compare_geometry(&a, &a.clone(), 1.0).unwrap();
        assert!(verdict.a_contained_in_buffer_of_b);
        assert!(verdict.b_contained_in_buffer_of_a);
        assert!(verdict.equal);
    }

    #[test]
    fn test_identical_tracks_equal_with_zero_buffer() {
        let a = track(&[(0.0, 0.0), (0.0005, 0.0005), (0.0, 0.001)]);
        assert!(compare_geometry(&a, &a, 0.0).unwrap().equal);
    }

    #[test]
    fn test_lateral_shift_beyond_buffer() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let shift = lon_offset(50.0);
        let b = track(&[(shift, 0.0), (shift, 0.001)]);
        let verdict = compare_geometry(&a, &b, 1.0).unwrap();
        assert!(!verdict.a_contained_in_buffer_of_b);
        assert!(!verdict.b_contained_in_buffer_of_a);
        assert!(!verdict.equal);
    }

    #[test]
    fn test_vanishing_buffer_separates_small_offset() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let shift = lon_offset(0.05);
        let b = track(&[(shift, 0.0), (shift, 0.001)]);
        for buffer in [0.0, 1e-3] {
            let verdict = compare_geometry(&a, &b, buffer).unwrap();
            assert!(!verdict.a_contained_in_buffer_of_b, "buffer {}", buffer);
            assert!(!verdict.b_contained_in_buffer_of_a, "buffer {}", buffer);
            assert!(!verdict.equal, "buffer {}", buffer);
        }
    }

    #[test]
    fn test_lateral_shift_inside_buffer() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let shift = lon_offset(0.5);
        let b = track(&[(shift, 0.0), (shift, 0.001)]);
        assert!(compare_geometry(&a, &b, 2.0).unwrap().equal);
    }

    #[test]
    fn test_subset_route_fails_one_direction() {
        let full = track(&[(0.0, 0.0), (0.0, 0.002)]);
        let half = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let verdict = compare_geometry(&half, &full, 1.0).unwrap();
        assert!(verdict.a_contained_in_buffer_of_b);
        assert!(!verdict.b_contained_in_buffer_of_a);
        assert!(!verdict.equal);
    }

    #[test]
    fn test_direction_does_not_matter() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001), (0.001, 0.001)]);
        let b = track(&[(0.001, 0.001), (0.0, 0.001), (0.0, 0.0)]);
        assert!(compare_geometry(&a, &b, 1.0).unwrap().equal);
    }

    #[test]
    fn test_symmetric_verdict() {
        let a = track(&[(0.0, 0.0), (0.0, 0.002)]);
        let b = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let ab = compare_geometry(&a, &b, 1.0).unwrap();
        let ba = compare_geometry(&b, &a, 1.0).unwrap();
        assert_eq!(ab.equal, ba.equal);
        assert_eq!(ab.a_contained_in_buffer_of_b, ba.b_contained_in_buffer_of_a);
    }

    #[test]
    fn test_large_buffer_accepts_different_paths() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        let b = track(&[(0.0005, 0.0), (0.0008, 0.0009)]);
        assert!(compare_geometry(&a, &b, 1_000.0).unwrap().equal);
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let a = track(&[(0.0, 0.0)]);
        let b = track(&[(0.0, 0.0), (0.0, 0.001)]);
        assert_eq!(
            compare_geometry(&a, &b, 1.0),
            Err(VerifyError::DegenerateGeometry {
                track: 'A',
                points: 1
            })
        );
        assert_eq!(
            compare_geometry(&b, &a, 1.0),
            Err(VerifyError::DegenerateGeometry {
                track: 'B',
                points: 1
            })
        );
    }

    #[test]
    fn test_repeated_point_is_degenerate() {
        let a = track(&[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)]);
        let b = track(&[(0.0, 0.0), (0.0, 0.001)]);
        assert!(matches!(
            compare_geometry(&a, &b, 1.0),
            Err(VerifyError::DegenerateGeometry { track: 'A', .. })
        ));
    }

    #[test]
    fn test_negative_buffer_rejected() {
        let a = track(&[(0.0, 0.0), (0.0, 0.001)]);
        assert!(matches!(
            compare_geometry(&a, &a, -1.0),
            Err(VerifyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_projection_is_metric_near_origin() {
        let frame = LocalFrame::centered_on(&Bounds {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 0.0,
            max_lat: 0.0,
        });
        let c = frame.project(0.0, 0.001);
        let expected = crate::haversine_distance(0.0, 0.0, 0.001, 0.0);
        assert!((c.y - expected).abs() < 1e-6);
        assert_eq!(c.x, 0.0);
    }
}

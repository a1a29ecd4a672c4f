//! Map parsed GPX/GeoJSON documents to a [`Track`].

use std::io::Cursor;

use geojson::{GeoJson, Geometry, Value};

use crate::{Point, Track, VerifyError};

/// Parse a track from bytes using the provided format hint (extension or file name).
pub fn parse_track(input: &[u8], format: &str) -> Result<Track, VerifyError> {
    let format_lc = format.to_ascii_lowercase();
    if format_lc.ends_with(".gpx") || format_lc == "gpx" {
        parse_gpx_track(input)
    } else if format_lc.ends_with(".geojson")
        || format_lc.ends_with(".json")
        || format_lc == "geojson"
        || format_lc == "json"
    {
        parse_geojson_track(input)
    } else {
        Err(VerifyError::UnsupportedFormat(format.to_string()))
    }
}

/// First track with points (segments joined in order), else first route with points.
fn parse_gpx_track(input: &[u8]) -> Result<Track, VerifyError> {
    let mut cursor = Cursor::new(input);
    let gpx = gpx::read(&mut cursor).map_err(|e| VerifyError::InputParse(e.to_string()))?;

    let to_point = |wpt: &gpx::Waypoint| {
        let p = wpt.point();
        Point::new(p.x(), p.y(), wpt.elevation)
    };

    for track in &gpx.tracks {
        let points: Vec<Point> = track
            .segments
            .iter()
            .flat_map(|seg| seg.points.iter().map(to_point))
            .collect();
        if !points.is_empty() {
            return Ok(Track::new(points));
        }
    }
    for route in &gpx.routes {
        if !route.points.is_empty() {
            return Ok(Track::new(route.points.iter().map(to_point).collect()));
        }
    }
    Err(VerifyError::NoTrackFound)
}

fn parse_geojson_track(input: &[u8]) -> Result<Track, VerifyError> {
    let text = std::str::from_utf8(input).map_err(|e| VerifyError::InputParse(e.to_string()))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| VerifyError::InputParse(e.to_string()))?;

    let found = match &geojson {
        GeoJson::Geometry(g) => first_line(g),
        GeoJson::Feature(f) => f.geometry.as_ref().and_then(first_line),
        GeoJson::FeatureCollection(fc) => fc
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .find_map(first_line),
    };
    let positions = found.ok_or(VerifyError::NoTrackFound)?;
    positions
        .iter()
        .map(|pos| position_to_point(pos.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map(Track::new)
}

/// Depth-first search for the first non-empty line geometry.
fn first_line(geometry: &Geometry) -> Option<Vec<&Vec<f64>>> {
    match &geometry.value {
        Value::LineString(coords) if !coords.is_empty() => Some(coords.iter().collect()),
        Value::MultiLineString(lines) => {
            let coords: Vec<&Vec<f64>> = lines.iter().flatten().collect();
            if coords.is_empty() {
                None
            } else {
                Some(coords)
            }
        }
        Value::GeometryCollection(children) => children.iter().find_map(first_line),
        _ => None,
    }
}

fn position_to_point(pos: &[f64]) -> Result<Point, VerifyError> {
    match pos {
        [lon, lat] => Ok(Point::new(*lon, *lat, None)),
        [lon, lat, ele, ..] => Ok(Point::new(*lon, *lat, Some(*ele))),
        _ => Err(VerifyError::InputParse(format!(
            "position needs at least 2 coordinates, got {}",
            pos.len()
        ))),
    }
}

// GeoJSON input (region shapes) and output (participant points).

use log::{debug, warn};
use snafu::prelude::*;

use serde::Serialize;
use serde_json::Value as JSValue;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::polis::*;

pub fn read_json_file(path: &str) -> PolisResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

/// Reads the region shapes of a feature collection, keyed by `properties.name`.
///
/// Polygons and multipolygons are supported. Features without a name or with
/// another geometry type are skipped. A later feature with the same name
/// replaces the earlier one.
pub fn read_region_shapes(path: &str) -> PolisResult<HashMap<String, Geometry>> {
    let js = read_json_file(path)?;
    let features = js
        .get("features")
        .and_then(|f| f.as_array())
        .context(UnexpectedJsonSnafu {
            path,
            expected: "a FeatureCollection with a features array",
        })?;

    let mut res: HashMap<String, Geometry> = HashMap::new();
    for (idx, feature) in features.iter().enumerate() {
        let name = match feature
            .get("properties")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
        {
            Some(n) => n.to_string(),
            None => {
                warn!("read_region_shapes: feature {} of {} has no name", idx, path);
                continue;
            }
        };
        let geometry = feature.get("geometry").unwrap_or(&JSValue::Null);
        let coordinates = geometry.get("coordinates").unwrap_or(&JSValue::Null);
        let shape = match geometry.get("type").and_then(|t| t.as_str()) {
            Some("Polygon") => Geometry::Polygon(read_polygon(&name, coordinates)?),
            Some("MultiPolygon") => {
                let parts = as_array(&name, coordinates, "a list of polygons")?
                    .iter()
                    .map(|p| read_polygon(&name, p))
                    .collect::<PolisResult<Vec<Polygon>>>()?;
                ensure!(
                    !parts.is_empty(),
                    InvalidGeometrySnafu {
                        name: name.as_str(),
                        reason: "empty multipolygon",
                    }
                );
                Geometry::MultiPolygon(parts)
            }
            other => {
                warn!(
                    "read_region_shapes: skipping {:?}: unsupported geometry {:?}",
                    name, other
                );
                continue;
            }
        };
        debug!("read_region_shapes: {:?} area {}", name, shape.area());
        if res.insert(name.clone(), shape).is_some() {
            warn!(
                "read_region_shapes: {:?} is declared twice, keeping the last",
                name
            );
        }
    }
    Ok(res)
}

fn as_array<'a>(name: &str, js: &'a JSValue, expected: &str) -> PolisResult<&'a Vec<JSValue>> {
    js.as_array().context(InvalidGeometrySnafu {
        name,
        reason: format!("expected {}, found {}", expected, js),
    })
}

fn read_polygon(name: &str, js: &JSValue) -> PolisResult<Polygon> {
    let mut rings: Vec<Vec<Coordinate>> = Vec::new();
    for ring in as_array(name, js, "a list of rings")? {
        let mut points: Vec<Coordinate> = Vec::new();
        for pos in as_array(name, ring, "a ring")? {
            points.push(read_position(name, pos)?);
        }
        rings.push(points);
    }
    ensure!(
        !rings.is_empty(),
        InvalidGeometrySnafu {
            name,
            reason: "polygon without rings",
        }
    );
    let exterior = rings.remove(0);
    Polygon::new(exterior, rings).map_err(|e| PolisError::InvalidGeometry {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

// Altitude and other extra values are ignored.
fn read_position(name: &str, js: &JSValue) -> PolisResult<Coordinate> {
    let values = as_array(name, js, "a position")?;
    match (
        values.first().and_then(|v| v.as_f64()),
        values.get(1).and_then(|v| v.as_f64()),
    ) {
        (Some(x), Some(y)) => Ok(Coordinate::new(x, y)),
        _ => InvalidGeometrySnafu {
            name,
            reason: format!("invalid position {}", js),
        }
        .fail(),
    }
}

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: Properties<'a>,
    geometry: Point,
}

#[derive(Serialize)]
struct Properties<'a> {
    participant_id: ParticipantId,
    island: &'a str,
}

#[derive(Serialize)]
struct Point {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

/// Writes the placements as a feature collection of points, ordered by
/// participant, and returns the written text.
pub fn write_feature_collection(path: &str, placements: &[Placement]) -> PolisResult<String> {
    let mut sorted: Vec<&Placement> = placements.iter().collect();
    sorted.sort_by_key(|p| p.participant_id);
    let collection = FeatureCollection {
        kind: "FeatureCollection",
        features: sorted
            .iter()
            .map(|p| Feature {
                kind: "Feature",
                properties: Properties {
                    participant_id: p.participant_id,
                    island: p.region.as_str(),
                },
                geometry: Point {
                    kind: "Point",
                    coordinates: [p.coordinate.x, p.coordinate.y],
                },
            })
            .collect(),
    };
    let text = serde_json::to_string_pretty(&collection).context(ParsingJsonSnafu { path })?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingJsonSnafu { path })?;
        }
    }
    fs::write(path, &text).context(WritingJsonSnafu { path })?;
    Ok(text)
}

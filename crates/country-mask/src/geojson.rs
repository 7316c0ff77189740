//! Parsing of the Natural Earth style country boundary GeoJSON.
//!
//! Feature properties carry the ISO code under `ISO_A2_EH` with `ISO_A2`
//! and `iso_a2` as fallbacks; features whose code is the "-99" sentinel
//! or not two letters are skipped. Feature order is preserved because the
//! rasterizer assigns contested cells first-match-wins.

use serde_json::Value;
use tracing::{debug, warn};

use climate_common::{ClimateError, ClimateResult};

use crate::polygon::Polygon;

/// ISO code property names, in priority order.
const ISO_PROPS: [&str; 3] = ["ISO_A2_EH", "ISO_A2", "iso_a2"];

/// One country: its ISO2 code and all its polygons.
#[derive(Debug, Clone)]
pub struct CountryShape {
    pub iso2: String,
    pub polygons: Vec<Polygon>,
}

/// Parse a GeoJSON FeatureCollection into country shapes, in feature
/// order.
pub fn parse_countries(geojson: &Value) -> ClimateResult<Vec<CountryShape>> {
    let features = geojson
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ClimateError::InternalError("boundary GeoJSON has no 'features' array".to_string())
        })?;

    let mut countries = Vec::new();
    for feature in features {
        let Some(iso2) = extract_iso2(feature) else {
            continue;
        };
        let Some(geometry) = feature.get("geometry") else {
            warn!(iso2 = %iso2, "Feature without geometry, skipping");
            continue;
        };
        let polygons = parse_geometry(geometry)?;
        if polygons.is_empty() {
            warn!(iso2 = %iso2, "Feature with empty geometry, skipping");
            continue;
        }
        countries.push(CountryShape { iso2, polygons });
    }

    debug!(count = countries.len(), "Parsed country boundaries");
    if countries.is_empty() {
        return Err(ClimateError::InternalError(
            "boundary GeoJSON yields no usable countries".to_string(),
        ));
    }
    Ok(countries)
}

/// Pick the ISO2 code out of feature properties, rejecting sentinels.
fn extract_iso2(feature: &Value) -> Option<String> {
    let props = feature.get("properties")?;
    for key in ISO_PROPS {
        if let Some(code) = props.get(key).and_then(Value::as_str) {
            let code = code.trim().to_ascii_uppercase();
            if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
                return Some(code);
            }
        }
    }
    None
}

fn parse_geometry(geometry: &Value) -> ClimateResult<Vec<Polygon>> {
    let gtype = geometry.get("type").and_then(Value::as_str).unwrap_or("");
    let coords = geometry.get("coordinates");

    match (gtype, coords) {
        ("Polygon", Some(c)) => Ok(parse_polygon(c).into_iter().collect()),
        ("MultiPolygon", Some(c)) => Ok(c
            .as_array()
            .map(|polys| polys.iter().filter_map(parse_polygon).collect())
            .unwrap_or_default()),
        _ => Ok(Vec::new()),
    }
}

/// One GeoJSON polygon: first ring exterior, remaining rings holes.
fn parse_polygon(coords: &Value) -> Option<Polygon> {
    let rings = coords.as_array()?;
    let mut iter = rings.iter().map(|r| parse_ring(r));
    let exterior = iter.next()??;
    let holes: Vec<_> = iter.flatten().collect();
    Some(Polygon::new(exterior, holes))
}

fn parse_ring(ring: &Value) -> Option<Vec<(f64, f64)>> {
    let points = ring.as_array()?;
    let mut out = Vec::with_capacity(points.len());
    for p in points {
        let pair = p.as_array()?;
        let lon = pair.first()?.as_f64()?;
        let lat = pair.get(1)?.as_f64()?;
        out.push((lon, lat));
    }
    if out.len() >= 3 {
        Some(out)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square_feature(iso_props: Value, lon0: f64) -> Value {
        json!({
            "type": "Feature",
            "properties": iso_props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [lon0, 0.0], [lon0 + 5.0, 0.0],
                    [lon0 + 5.0, 5.0], [lon0, 5.0], [lon0, 0.0]
                ]]
            }
        })
    }

    #[test]
    fn test_parse_feature_collection() {
        let gj = json!({
            "type": "FeatureCollection",
            "features": [
                square_feature(json!({"ISO_A2_EH": "FR"}), 0.0),
                square_feature(json!({"ISO_A2": "de"}), 10.0),
            ]
        });
        let countries = parse_countries(&gj).unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0].iso2, "FR");
        assert_eq!(countries[1].iso2, "DE");
        assert!(countries[0].polygons[0].contains(2.0, 2.0));
    }

    #[test]
    fn test_iso_property_priority() {
        let gj = json!({
            "features": [
                square_feature(json!({"ISO_A2": "XX", "ISO_A2_EH": "NO"}), 0.0),
            ]
        });
        let countries = parse_countries(&gj).unwrap();
        assert_eq!(countries[0].iso2, "NO");
    }

    #[test]
    fn test_sentinel_codes_are_skipped() {
        let gj = json!({
            "features": [
                square_feature(json!({"ISO_A2_EH": "-99", "ISO_A2": "-99"}), 0.0),
                square_feature(json!({"ISO_A2_EH": "FRA"}), 0.0),
                square_feature(json!({"ISO_A2_EH": "IT"}), 10.0),
            ]
        });
        let countries = parse_countries(&gj).unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].iso2, "IT");
    }

    #[test]
    fn test_multipolygon() {
        let gj = json!({
            "features": [{
                "type": "Feature",
                "properties": {"ISO_A2_EH": "ID"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]],
                        [[[10.0, 0.0], [12.0, 0.0], [12.0, 2.0], [10.0, 2.0], [10.0, 0.0]]]
                    ]
                }
            }]
        });
        let countries = parse_countries(&gj).unwrap();
        assert_eq!(countries[0].polygons.len(), 2);
        assert!(countries[0].polygons[1].contains(11.0, 1.0));
    }

    #[test]
    fn test_no_features() {
        assert!(parse_countries(&json!({"type": "FeatureCollection"})).is_err());
    }
}

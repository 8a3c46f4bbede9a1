use anyhow::{ensure, Context};
use serde::Deserialize;
use serde_json::Value;

/// One feature of the loaded collection: the configured name property plus a
/// centroid for map anchoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub name: String,
    pub centroid: (f64, f64),
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Value,
}

/// Load a GeoJSON FeatureCollection, naming each feature by `feature_key`
/// from its properties. Centroids are the mean of all coordinate pairs,
/// which is plenty for anchoring markers.
pub fn load_geojson(path: &str, feature_key: &str) -> anyhow::Result<Vec<RegionFeature>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read GeoJSON file: {}", path))?;
    parse_geojson(&text, feature_key).with_context(|| format!("invalid GeoJSON file: {}", path))
}

pub fn parse_geojson(text: &str, feature_key: &str) -> anyhow::Result<Vec<RegionFeature>> {
    let collection: FeatureCollection =
        serde_json::from_str(text).context("failed to parse FeatureCollection")?;
    ensure!(
        collection.kind == "FeatureCollection",
        "expected a FeatureCollection, got '{}'",
        collection.kind
    );

    let mut out = Vec::with_capacity(collection.features.len());
    for (idx, feature) in collection.features.iter().enumerate() {
        let name = feature
            .properties
            .get(feature_key)
            .and_then(|v| v.as_str())
            .with_context(|| format!("feature {} has no string property '{}'", idx, feature_key))?
            .to_string();

        let mut sum = (0.0, 0.0);
        let mut count = 0usize;
        accumulate_points(&feature.geometry.coordinates, &mut sum, &mut count);
        ensure!(count > 0, "feature '{}' has no coordinates", name);
        // GeoJSON orders lon,lat; the map view wants lat,lon.
        let centroid = (sum.1 / count as f64, sum.0 / count as f64);
        out.push(RegionFeature { name, centroid });
    }
    Ok(out)
}

fn accumulate_points(coords: &Value, sum: &mut (f64, f64), count: &mut usize) {
    if let Value::Array(items) = coords {
        let pair = items.len() >= 2 && items[0].is_number() && items[1].is_number();
        if pair {
            if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
                sum.0 += lon;
                sum.1 += lat;
                *count += 1;
            }
        } else {
            for item in items {
                accumulate_points(item, sum, count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_geojson;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "North", "code": 1},
                "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "South"},
                "geometry": {"type": "Point", "coordinates": [10.0, -4.0]}
            }
        ]
    }"#;

    #[test]
    fn parses_features_and_centroids() {
        let regions = parse_geojson(SAMPLE, "name").expect("parse");
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].name, "North");
        // mean of the polygon ring, as (lat, lon)
        assert_eq!(regions[0].centroid, (1.0, 1.0));
        assert_eq!(regions[1].name, "South");
        assert_eq!(regions[1].centroid, (-4.0, 10.0));
    }

    #[test]
    fn rejects_missing_name_property() {
        assert!(parse_geojson(SAMPLE, "region").is_err());
    }

    #[test]
    fn rejects_non_collections() {
        let err = parse_geojson(r#"{"type": "Feature", "features": []}"#, "name").unwrap_err();
        assert!(err.to_string().contains("FeatureCollection"));
    }
}

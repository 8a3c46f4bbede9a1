use anyhow::ensure;

use crate::io::geojson::{load_geojson, RegionFeature};

/// One region of the geospatial layer, backing a GeoJSON feature.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAgent {
    pub name: String,
    pub centroid: (f64, f64),
}

/// The geospatial layer: one region agent per configured location, in
/// location order.
#[derive(Debug, Clone)]
pub struct GeoSpace {
    regions: Vec<RegionAgent>,
}

impl GeoSpace {
    /// Build the space from a GeoJSON file, validating that the features
    /// cover the configured locations exactly. The original assumed index
    /// alignment silently; here a mismatch fails construction.
    pub fn from_geojson(path: &str, feature_key: &str, locations: &[String]) -> anyhow::Result<Self> {
        let features = load_geojson(path, feature_key)?;
        Self::from_features(features, locations)
    }

    pub fn from_features(features: Vec<RegionFeature>, locations: &[String]) -> anyhow::Result<Self> {
        ensure!(
            features.len() == locations.len(),
            "GeoJSON has {} features but {} locations are configured",
            features.len(),
            locations.len()
        );
        let mut regions = Vec::with_capacity(locations.len());
        for location in locations {
            let feature = features
                .iter()
                .find(|f| &f.name == location)
                .ok_or_else(|| anyhow::anyhow!("no GeoJSON feature named '{}'", location))?;
            regions.push(RegionAgent {
                name: feature.name.clone(),
                centroid: feature.centroid,
            });
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[RegionAgent] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::GeoSpace;
    use crate::io::geojson::RegionFeature;

    fn features() -> Vec<RegionFeature> {
        vec![
            RegionFeature { name: "North".to_string(), centroid: (1.0, 1.0) },
            RegionFeature { name: "South".to_string(), centroid: (-1.0, 1.0) },
        ]
    }

    #[test]
    fn regions_follow_location_order() {
        let locations = vec!["South".to_string(), "North".to_string()];
        let space = GeoSpace::from_features(features(), &locations).expect("space");
        assert_eq!(space.len(), 2);
        assert_eq!(space.regions()[0].name, "South");
        assert_eq!(space.regions()[1].name, "North");
    }

    #[test]
    fn rejects_count_and_name_mismatches() {
        let too_few = vec!["North".to_string()];
        assert!(GeoSpace::from_features(features(), &too_few).is_err());

        let wrong_name = vec!["North".to_string(), "East".to_string()];
        assert!(GeoSpace::from_features(features(), &wrong_name).is_err());
    }
}

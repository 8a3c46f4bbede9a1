use serde::Serialize;
use serde_json::json;

use crate::collect::{LocationCollector, REPORTERS};
use crate::model::person::Person;
use crate::space::geo::RegionAgent;
use crate::viz::portrayal::{person_portrayal, region_portrayal};

/// The map widget: a leaflet-style view anchored on the scenario's center
/// coordinates, rendering region and person portrayals.
#[derive(Debug, Clone, Serialize)]
pub struct MapModule {
    pub view: (f64, f64),
    pub zoom: u32,
    pub map_width: u32,
    pub map_height: u32,
}

impl MapModule {
    pub fn new(view: (f64, f64)) -> Self {
        Self { view, zoom: 7, map_width: 960, map_height: 480 }
    }

    pub fn render(&self, regions: &[RegionAgent], persons: &[Person]) -> serde_json::Value {
        let region_views: Vec<serde_json::Value> = regions
            .iter()
            .map(|r| {
                json!({
                    "name": r.name,
                    "centroid": [r.centroid.0, r.centroid.1],
                    "portrayal": region_portrayal(),
                })
            })
            .collect();
        let person_views: Vec<serde_json::Value> = persons
            .iter()
            .map(|p| serde_json::to_value(person_portrayal(p)).unwrap_or_default())
            .collect();
        json!({
            "view": [self.view.0, self.view.1],
            "zoom": self.zoom,
            "map_width": self.map_width,
            "map_height": self.map_height,
            "regions": region_views,
            "agents": person_views,
        })
    }
}

/// Per-location summary chart over the localized collectors.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryChartModule {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub data_collector: &'static str,
    pub geospatial: bool,
    pub location_index: usize,
}

impl SummaryChartModule {
    pub fn new(location_index: usize) -> Self {
        Self {
            canvas_width: 900,
            canvas_height: 420,
            data_collector: "localized_data_collectors",
            geospatial: true,
            location_index,
        }
    }

    pub fn render(&self, collector: &LocationCollector) -> serde_json::Value {
        json!({
            "canvas_width": self.canvas_width,
            "canvas_height": self.canvas_height,
            "location": collector.key,
            "series": collector.all_series(),
        })
    }
}

/// A labelled readout of the latest collected row.
#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub label: String,
    pub content: Vec<&'static str>,
}

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), content: REPORTERS.to_vec() }
    }

    pub fn render(&self, collector: &LocationCollector) -> serde_json::Value {
        let mut values = serde_json::Map::new();
        if let Some(latest) = collector.latest() {
            for (reporter, value) in REPORTERS.iter().zip(latest.values().iter()) {
                values.insert((*reporter).to_string(), json!(value));
            }
        }
        json!({ "label": self.label, "values": values })
    }
}

#[cfg(test)]
mod tests {
    use super::{Label, MapModule, SummaryChartModule};
    use crate::collect::{LocationCollector, ReporterRow};
    use crate::model::person::Person;
    use crate::space::geo::RegionAgent;

    #[test]
    fn map_defaults_match_the_dashboard() {
        let map = MapModule::new((5.85, -55.2));
        assert_eq!(map.zoom, 7);
        assert_eq!(map.map_width, 960);
        assert_eq!(map.map_height, 480);

        let regions = vec![RegionAgent { name: "Paramaribo".to_string(), centroid: (5.85, -55.2) }];
        let persons = vec![Person::susceptible(30, 0)];
        let view = map.render(&regions, &persons);
        assert_eq!(view["zoom"], 7);
        assert_eq!(view["regions"][0]["portrayal"]["color"], "Blue");
        assert_eq!(view["agents"][0]["color"], "Gray");
    }

    #[test]
    fn chart_defaults_match_the_dashboard() {
        let chart = SummaryChartModule::new(0);
        assert_eq!(chart.canvas_width, 900);
        assert_eq!(chart.canvas_height, 420);
        assert_eq!(chart.data_collector, "localized_data_collectors");
        assert!(chart.geospatial);
    }

    #[test]
    fn label_renders_the_latest_row() {
        let mut collector = LocationCollector::new(1);
        collector.collect(ReporterRow { susceptible: 12, deaths: 1, ..Default::default() });
        let label = Label::new("Paramaribo");
        let view = label.render(&collector);
        assert_eq!(view["label"], "Paramaribo");
        assert_eq!(view["values"]["Susceptible"], 12);
        assert_eq!(view["values"]["Deaths"], 1);

        let empty = Label::new("Wanica").render(&LocationCollector::new(2));
        assert!(empty["values"].as_object().expect("object").is_empty());
    }
}

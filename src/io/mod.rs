pub mod geojson;
pub mod params_json;
pub mod population;
pub mod run_log;

use geovax::io::params_json::ParameterStore;
use geovax::io::population::{load_age_shares_csv, load_case_seeds_csv, load_locations_csv};
use geovax::model::epidemic::EpidemicModel;
use geovax::space::environment::{GeoEnvironment, GeoEnvironmentConfig};
use geovax::space::geo::GeoSpace;

fn main() -> anyhow::Result<()> {
    geovax::logging::init();

    // Paths default to the bundled demo data; override via env.
    let geojson_file =
        std::env::var("GEOJSON_FILE").unwrap_or_else(|_| "demos/data/regions.geojson".to_string());
    let feature_key = std::env::var("GEOJSON_FEATURE_KEY").unwrap_or_else(|_| "name".to_string());
    let locations_csv =
        std::env::var("LOCATIONS_CSV").unwrap_or_else(|_| "demos/data/locations.csv".to_string());
    let case_seeds_csv =
        std::env::var("CASE_SEEDS_CSV").unwrap_or_else(|_| "demos/data/case_seeds.csv".to_string());
    let age_shares_csv =
        std::env::var("AGE_SHARES_CSV").unwrap_or_else(|_| "demos/data/age_shares.csv".to_string());
    let params_file =
        std::env::var("PARAMS_FILE").unwrap_or_else(|_| "demos/data/parameters.json".to_string());
    let steps: u32 = std::env::var("STEPS").ok().and_then(|v| v.parse().ok()).unwrap_or(45);

    let (locations, population) = load_locations_csv(&locations_csv)?;
    let case_seeds = load_case_seeds_csv(&case_seeds_csv, &locations)?;
    let age_shares = load_age_shares_csv(&age_shares_csv, &locations)?;

    let space = GeoSpace::from_geojson(&geojson_file, &feature_key, &locations)?;
    let center = {
        let n = space.len() as f64;
        let sum = space
            .regions()
            .iter()
            .fold((0.0, 0.0), |acc, r| (acc.0 + r.centroid.0, acc.1 + r.centroid.1));
        (sum.0 / n, sum.1 / n)
    };

    let store = ParameterStore::new(&params_file);
    let scenario = store.scenario()?;

    let config = GeoEnvironmentConfig {
        locations,
        center_coords: center,
        population,
        case_seeds,
        age_shares,
    };
    let env = GeoEnvironment::new(space, config, store, scenario)?;
    let mut model = EpidemicModel::new(env)?;
    model.run(steps)?;

    println!("step,susceptible,exposed,infected,deaths,recovered,vaccinated");
    for (step, row) in model.timeline().iter().enumerate() {
        println!(
            "{},{},{},{},{},{},{}",
            step, row.susceptible, row.exposed, row.infected, row.deaths, row.recovered, row.vaccinated
        );
    }

    let env = model.env();
    println!("\nfinal vaccine allocation per location:");
    for record in env.records() {
        println!("  {}: {} doses", record.location_name, record.vaccine_allocation.total());
    }

    Ok(())
}

use geovax::io::geojson::RegionFeature;
use geovax::io::params_json::{ParameterStore, ScenarioParams};
use geovax::io::population::CaseSeed;
use geovax::model::age::N_AGE_BANDS;
use geovax::model::epidemic::EpidemicModel;
use geovax::space::environment::{GeoEnvironment, GeoEnvironmentConfig};
use geovax::space::geo::GeoSpace;

fn main() -> anyhow::Result<()> {
    geovax::logging::init();

    // Toy one-city scenario, wired entirely in code.
    let locations = vec!["Paramaribo".to_string()];
    let space = GeoSpace::from_features(
        vec![RegionFeature { name: "Paramaribo".to_string(), centroid: (5.852, -55.203) }],
        &locations,
    )?;

    let mut scenario = ScenarioParams::default();
    scenario.seed = 42;
    scenario.scale = 500;
    scenario.vaccines_available = 5_000;
    scenario.infection_rate = 0.35;
    scenario.facemask_share = 0.3;
    scenario.hesitancy_share = 0.1;
    let mut elderly = [0.0; N_AGE_BANDS];
    elderly[7] = 1.0;
    elderly[8] = 2.0;
    scenario.prioritization_weights.insert("elderly_first".to_string(), elderly);
    scenario.activated_weights.insert("elderly_first".to_string(), true);

    let config = GeoEnvironmentConfig {
        locations,
        center_coords: (5.852, -55.203),
        population: vec![240_000],
        case_seeds: vec![CaseSeed { exposed: 1_000, infected: 500, recovered: 0, dead: 0 }],
        // rough urban age pyramid, young-heavy
        age_shares: vec![[0.17, 0.16, 0.15, 0.14, 0.12, 0.10, 0.08, 0.05, 0.03]],
    };

    let store = ParameterStore::new("single_city_params.json");
    let env = GeoEnvironment::new(space, config, store, scenario)?;
    let mut model = EpidemicModel::new(env)?;
    model.run(60)?;

    println!("step,susceptible,exposed,infected,deaths,recovered,vaccinated");
    for (step, row) in model.timeline().iter().enumerate() {
        println!(
            "{},{},{},{},{},{},{}",
            step, row.susceptible, row.exposed, row.infected, row.deaths, row.recovered, row.vaccinated
        );
    }

    let env = model.env();
    for (label, collector) in env.labels().iter().zip(env.collectors().iter()) {
        println!("{}", serde_json::to_string_pretty(&label.render(collector))?);
    }

    let log_path = model.write_log("logs", "single-city")?;
    println!("run log written to {}", log_path.display());

    Ok(())
}

use anyhow::{ensure, Context};
use log::{debug, info};

use crate::collect::{LocationCollector, ReporterRow};
use crate::io::params_json::{ParameterStore, ScenarioParams};
use crate::io::population::CaseSeed;
use crate::math::matrix::transpose;
use crate::model::age::{BandedCounts, N_AGE_BANDS};
use crate::model::location::{CompartmentCounts, LocationCensus, LocationRecord};
use crate::optimize::{AllocationProblem, AllocationResult, VaccineSolver, WeightedPrioritySolver};
use crate::space::geo::GeoSpace;
use crate::viz::widgets::{Label, MapModule, SummaryChartModule};

/// Static scenario wiring for the environment: the configured locations and
/// everything indexed by them.
#[derive(Debug, Clone)]
pub struct GeoEnvironmentConfig {
    pub locations: Vec<String>,
    pub center_coords: (f64, f64),
    pub population: Vec<u32>,
    pub case_seeds: Vec<CaseSeed>,
    pub age_shares: Vec<[f64; N_AGE_BANDS]>,
}

/// The orchestrator: owns the geospatial layer, the per-location records and
/// their persistence, the susceptible matrix feeding the vaccine optimizer,
/// and the visualization widgets.
pub struct GeoEnvironment {
    space: GeoSpace,
    locations: Vec<String>,
    population: Vec<u32>,
    records: Vec<LocationRecord>,
    store: ParameterStore,
    scenario: ScenarioParams,
    infection_rates: Vec<f64>,
    mortality_rates: Vec<f64>,
    sub_problems: Vec<[f64; N_AGE_BANDS]>,
    susceptible_matrix: Vec<Vec<f64>>,
    solver: Box<dyn VaccineSolver + Send + Sync>,
    map: MapModule,
    collectors: Vec<LocationCollector>,
    labels: Vec<Label>,
    summaries: Vec<SummaryChartModule>,
}

impl GeoEnvironment {
    /// Build the environment from a GeoJSON file, validating the features
    /// against the configured locations.
    pub fn from_geojson(
        geojson_file: &str,
        feature_key: &str,
        config: GeoEnvironmentConfig,
        store: ParameterStore,
        scenario: ScenarioParams,
    ) -> anyhow::Result<Self> {
        let space = GeoSpace::from_geojson(geojson_file, feature_key, &config.locations)
            .with_context(|| format!("loading geospace from {}", geojson_file))?;
        Self::new(space, config, store, scenario)
    }

    pub fn new(
        space: GeoSpace,
        config: GeoEnvironmentConfig,
        store: ParameterStore,
        scenario: ScenarioParams,
    ) -> anyhow::Result<Self> {
        let n = config.locations.len();
        ensure!(n > 0, "at least one location is required");
        ensure!(space.len() == n, "geospace has {} regions for {} locations", space.len(), n);
        ensure!(config.population.len() == n, "population list does not cover every location");
        ensure!(config.case_seeds.len() == n, "case seed list does not cover every location");
        ensure!(config.age_shares.len() == n, "age share list does not cover every location");

        info!("initializing location data for {} locations", n);
        let mut records: Vec<LocationRecord> = config
            .locations
            .iter()
            .zip(config.population.iter())
            .map(|(name, pop)| LocationRecord::zeroed(name.clone(), *pop))
            .collect();
        populate_records(&mut records, &config.case_seeds, &config.age_shares)?;
        store.write_location_data(&records)?;

        let map = MapModule::new(config.center_coords);
        let collectors: Vec<LocationCollector> =
            (1..=n).map(LocationCollector::new).collect();
        let labels: Vec<Label> = config.locations.iter().map(Label::new).collect();
        let summaries: Vec<SummaryChartModule> = (0..n).map(SummaryChartModule::new).collect();

        let mut env = Self {
            space,
            locations: config.locations,
            population: config.population,
            records,
            store,
            scenario,
            infection_rates: Vec::new(),
            mortality_rates: Vec::new(),
            sub_problems: Vec::new(),
            susceptible_matrix: Vec::new(),
            solver: Box::new(WeightedPrioritySolver),
            map,
            collectors,
            labels,
            summaries,
        };
        env.update_infection_rates();
        env.update_mortality_rates();
        env.activate_sub_problems();
        env.rebuild_susceptible_matrix();
        Ok(env)
    }

    pub fn set_solver(&mut self, solver: Box<dyn VaccineSolver + Send + Sync>) {
        self.solver = solver;
    }

    /// Wholesale rebuild of the locations x bands susceptible matrix from the
    /// current records.
    pub fn rebuild_susceptible_matrix(&mut self) {
        self.susceptible_matrix = self
            .records
            .iter()
            .map(|r| r.susceptible_agents.as_row())
            .collect();
    }

    /// Overwrite the records wholesale from an agent census, already scaled
    /// back to real-population units.
    pub fn observe(&mut self, censuses: &[LocationCensus]) -> anyhow::Result<()> {
        ensure!(
            censuses.len() == self.records.len(),
            "census covers {} locations, expected {}",
            censuses.len(),
            self.records.len()
        );
        for (record, census) in self.records.iter_mut().zip(censuses.iter()) {
            record.data = census.counts;
            record.susceptible_agents = census.susceptible_bands;
            record.check_counts()?;
        }
        Ok(())
    }

    /// Persist the records, rebuild the susceptible matrix, and run the
    /// allocation, writing its results back through the store.
    pub fn refresh(&mut self) -> anyhow::Result<AllocationResult> {
        debug!("refreshing location data and vaccine allocation");
        self.store.write_location_data(&self.records)?;
        self.rebuild_susceptible_matrix();
        self.apply_vaccine_allocation()
    }

    /// Select the weight vectors whose activation flags are set.
    pub fn activate_sub_problems(&mut self) {
        self.sub_problems = self
            .scenario
            .activated_weights
            .iter()
            .filter(|(_, on)| **on)
            .filter_map(|(name, _)| self.scenario.prioritization_weights.get(name).copied())
            .collect();
    }

    /// Build the allocation problem from the transposed susceptible matrix
    /// and solve it.
    pub fn allocate_vaccines(&self) -> anyhow::Result<AllocationResult> {
        let problem = AllocationProblem {
            susceptibles: transpose(&self.susceptible_matrix)?,
            available: self.scenario.vaccines_available,
            priorities: self.sub_problems.clone(),
        };
        self.solver.solve(&problem)
    }

    /// Solve, write the allocation into the store, and reload the records
    /// from the persisted `LOCATION_DATA`.
    pub fn apply_vaccine_allocation(&mut self) -> anyhow::Result<AllocationResult> {
        let result = self.allocate_vaccines()?;
        info!(
            "allocated {} of {} doses ({} left over)",
            result.allocated, self.scenario.vaccines_available, result.leftover
        );
        self.store.write_vaccine_allocation(&result)?;
        self.records = self.store.read_location_data()?;
        Ok(result)
    }

    /// Replace one location's susceptible band counts. The bands must still
    /// sum to the location's susceptible compartment.
    pub fn record_susceptibles(&mut self, location: usize, bands: BandedCounts) -> anyhow::Result<()> {
        let record = self
            .records
            .get_mut(location)
            .with_context(|| format!("no location at index {}", location))?;
        ensure!(
            bands.total() == record.data.susceptible,
            "band counts sum to {} but '{}' has {} susceptibles",
            bands.total(),
            record.location_name,
            record.data.susceptible
        );
        record.susceptible_agents = bands;
        Ok(())
    }

    pub fn update_infection_rates(&mut self) {
        self.infection_rates = self
            .locations
            .iter()
            .map(|l| self.scenario.infection_rate_for(l))
            .collect();
    }

    pub fn update_mortality_rates(&mut self) {
        self.mortality_rates = self
            .locations
            .iter()
            .map(|l| self.scenario.mortality_rate_for(l))
            .collect();
    }

    pub fn collect(&mut self, rows: &[ReporterRow]) -> anyhow::Result<()> {
        ensure!(
            rows.len() == self.collectors.len(),
            "collected {} rows for {} collectors",
            rows.len(),
            self.collectors.len()
        );
        for (collector, row) in self.collectors.iter_mut().zip(rows.iter()) {
            collector.collect(*row);
        }
        Ok(())
    }

    pub fn space(&self) -> &GeoSpace {
        &self.space
    }

    pub fn map(&self) -> &MapModule {
        &self.map
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn population(&self) -> &[u32] {
        &self.population
    }

    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn scenario(&self) -> &ScenarioParams {
        &self.scenario
    }

    pub fn infection_rate(&self, location: usize) -> f64 {
        self.infection_rates[location]
    }

    pub fn mortality_rate(&self, location: usize) -> f64 {
        self.mortality_rates[location]
    }

    pub fn susceptible_matrix(&self) -> &[Vec<f64>] {
        &self.susceptible_matrix
    }

    pub fn collectors(&self) -> &[LocationCollector] {
        &self.collectors
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn summaries(&self) -> &[SummaryChartModule] {
        &self.summaries
    }
}

/// Seed the zeroed records: non-susceptible compartments from the case
/// seeds, the remainder susceptible, and the susceptible bands split by the
/// location's age shares.
fn populate_records(
    records: &mut [LocationRecord],
    case_seeds: &[CaseSeed],
    age_shares: &[[f64; N_AGE_BANDS]],
) -> anyhow::Result<()> {
    for ((record, seed), shares) in records.iter_mut().zip(case_seeds).zip(age_shares) {
        let seeded = seed.exposed + seed.infected + seed.recovered + seed.dead;
        ensure!(
            seeded <= record.population,
            "location '{}': seeds {} cases for a population of {}",
            record.location_name,
            seeded,
            record.population
        );
        record.data = CompartmentCounts {
            susceptible: record.population - seeded,
            exposed: seed.exposed,
            infected: seed.infected,
            recovered: seed.recovered,
            dead: seed.dead,
        };
        record.susceptible_agents = BandedCounts::from_weights(record.data.susceptible, shares);
        record.vaccine_allocation = BandedCounts::zero();
        record.check()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{GeoEnvironment, GeoEnvironmentConfig};
    use crate::io::geojson::RegionFeature;
    use crate::io::params_json::{ParameterStore, ScenarioParams};
    use crate::io::population::CaseSeed;
    use crate::model::age::N_AGE_BANDS;
    use crate::space::geo::GeoSpace;

    fn test_env(dir: &tempfile::TempDir, scenario: ScenarioParams) -> GeoEnvironment {
        let locations = vec!["North".to_string(), "South".to_string()];
        let space = GeoSpace::from_features(
            vec![
                RegionFeature { name: "North".to_string(), centroid: (1.0, 1.0) },
                RegionFeature { name: "South".to_string(), centroid: (-1.0, 1.0) },
            ],
            &locations,
        )
        .expect("space");
        let config = GeoEnvironmentConfig {
            locations,
            center_coords: (0.0, 1.0),
            population: vec![9000, 3000],
            case_seeds: vec![
                CaseSeed { exposed: 100, infected: 50, recovered: 0, dead: 0 },
                CaseSeed::default(),
            ],
            age_shares: vec![[1.0; N_AGE_BANDS]; 2],
        };
        let store = ParameterStore::new(dir.path().join("params.json"));
        GeoEnvironment::new(space, config, store, scenario).expect("environment")
    }

    #[test]
    fn populate_conserves_population() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = test_env(&dir, ScenarioParams::default());
        let records = env.records();
        assert_eq!(records[0].data.total(), 9000);
        assert_eq!(records[0].data.susceptible, 8850);
        assert_eq!(records[0].susceptible_agents.total(), 8850);
        assert_eq!(records[1].data.susceptible, 3000);

        // persisted at construction
        let persisted = env.store().read_location_data().expect("read back");
        assert_eq!(persisted, records);
    }

    #[test]
    fn susceptible_matrix_is_locations_by_bands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = test_env(&dir, ScenarioParams::default());
        let m = env.susceptible_matrix();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].len(), N_AGE_BANDS);
        let row_sum: f64 = m[0].iter().sum();
        assert_eq!(row_sum as u32, 8850);
    }

    #[test]
    fn rates_come_from_scenario_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scenario = ScenarioParams::default();
        scenario.infection_rate = 0.2;
        scenario.infection_rate_overrides.insert("South".to_string(), 0.5);
        scenario.mortality_rate = 0.01;
        let env = test_env(&dir, scenario);
        assert_eq!(env.infection_rate(0), 0.2);
        assert_eq!(env.infection_rate(1), 0.5);
        assert_eq!(env.mortality_rate(0), 0.01);
    }

    #[test]
    fn activated_weights_become_sub_problems() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scenario = ScenarioParams::default();
        let mut elderly = [0.0; N_AGE_BANDS];
        elderly[8] = 1.0;
        scenario.prioritization_weights.insert("elderly_first".to_string(), elderly);
        scenario.prioritization_weights.insert("uniform".to_string(), [1.0; N_AGE_BANDS]);
        scenario.activated_weights.insert("elderly_first".to_string(), true);
        scenario.activated_weights.insert("uniform".to_string(), false);
        scenario.vaccines_available = 90;

        let env = test_env(&dir, scenario);
        let result = env.allocate_vaccines().expect("allocate");
        assert_eq!(result.allocated, 90);
        let band8: u32 = result.per_location.iter().map(|b| b.value(8)).sum();
        assert_eq!(band8, 90);
    }

    #[test]
    fn refresh_writes_allocation_back_into_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut env = test_env(&dir, ScenarioParams::default());
        let result = env.refresh().expect("refresh");
        assert_eq!(result.allocated, 1000);

        let allocated_in_records: u32 =
            env.records().iter().map(|r| r.vaccine_allocation.total()).sum();
        assert_eq!(allocated_in_records, 1000);

        let persisted = env.store().read_location_data().expect("read back");
        assert_eq!(persisted, env.records());
    }

    #[test]
    fn record_susceptibles_guards_the_compartment_sum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut env = test_env(&dir, ScenarioParams::default());
        let bands = env.records()[1].susceptible_agents;
        env.record_susceptibles(1, bands).expect("aligned bands");

        let mut drifted = bands;
        drifted.set(0, drifted.value(0) + 1);
        assert!(env.record_susceptibles(1, drifted).is_err());
    }

    #[test]
    fn widgets_cover_every_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = test_env(&dir, ScenarioParams::default());
        assert_eq!(env.collectors().len(), 2);
        assert_eq!(env.collectors()[1].key, "loc_2");
        assert_eq!(env.labels()[0].label, "North");
        assert_eq!(env.summaries()[1].location_index, 1);
        assert_eq!(env.map().zoom, 7);
    }
}

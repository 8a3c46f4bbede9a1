use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::age::N_AGE_BANDS;
use crate::model::location::LocationRecord;
use crate::optimize::AllocationResult;

/// Replace one top-level key of a JSON parameters file, leaving every other
/// key untouched. A missing file starts as an empty object.
pub fn update_json_key(path: &Path, key: &str, value: &impl Serialize) -> anyhow::Result<()> {
    let mut root = read_root(path)?;
    let obj = root
        .as_object_mut()
        .with_context(|| format!("parameters file is not a JSON object: {}", path.display()))?;
    obj.insert(key.to_string(), serde_json::to_value(value)?);
    let text = serde_json::to_string_pretty(&root)?;
    std::fs::write(path, text + "\n")
        .with_context(|| format!("failed to write parameters file: {}", path.display()))?;
    Ok(())
}

/// Read one top-level key back; `None` when the file or the key is absent.
pub fn read_json_key(path: &Path, key: &str) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let root = read_root(path)?;
    Ok(root.get(key).cloned())
}

fn read_root(path: &Path) -> anyhow::Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameters file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse parameters file: {}", path.display()))
}

/// Scenario parameters, held under the top-level `SCENARIO` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioParams {
    #[serde(default = "default_vaccines_available")]
    pub vaccines_available: u32,
    /// Persons represented by one agent.
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default)]
    pub seed: u64,
    /// Baseline per-step infection rate, overridable per location.
    #[serde(default = "default_infection_rate")]
    pub infection_rate: f64,
    #[serde(default)]
    pub infection_rate_overrides: BTreeMap<String, f64>,
    /// Probability an infection ends in death, overridable per location.
    #[serde(default = "default_mortality_rate")]
    pub mortality_rate: f64,
    #[serde(default)]
    pub mortality_rate_overrides: BTreeMap<String, f64>,
    #[serde(default = "default_incubation_days")]
    pub incubation_days: u32,
    #[serde(default = "default_infectious_days")]
    pub infectious_days: u32,
    #[serde(default)]
    pub facemask_share: f64,
    #[serde(default)]
    pub distancing_share: f64,
    #[serde(default)]
    pub hesitancy_share: f64,
    /// Named age-band weight vectors for vaccine prioritization.
    #[serde(default)]
    pub prioritization_weights: BTreeMap<String, [f64; N_AGE_BANDS]>,
    /// Which named weight vectors are activated as sub-problems.
    #[serde(default)]
    pub activated_weights: BTreeMap<String, bool>,
    /// Steps between allocation refreshes.
    #[serde(default = "default_allocation_interval")]
    pub allocation_interval: u32,
}

fn default_vaccines_available() -> u32 {
    1000
}

fn default_scale() -> u32 {
    1000
}

fn default_infection_rate() -> f64 {
    0.3
}

fn default_mortality_rate() -> f64 {
    0.02
}

fn default_incubation_days() -> u32 {
    5
}

fn default_infectious_days() -> u32 {
    10
}

fn default_allocation_interval() -> u32 {
    7
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            vaccines_available: default_vaccines_available(),
            scale: default_scale(),
            seed: 0,
            infection_rate: default_infection_rate(),
            infection_rate_overrides: BTreeMap::new(),
            mortality_rate: default_mortality_rate(),
            mortality_rate_overrides: BTreeMap::new(),
            incubation_days: default_incubation_days(),
            infectious_days: default_infectious_days(),
            facemask_share: 0.0,
            distancing_share: 0.0,
            hesitancy_share: 0.0,
            prioritization_weights: BTreeMap::new(),
            activated_weights: BTreeMap::new(),
            allocation_interval: default_allocation_interval(),
        }
    }
}

impl ScenarioParams {
    pub fn infection_rate_for(&self, location: &str) -> f64 {
        self.infection_rate_overrides
            .get(location)
            .copied()
            .unwrap_or(self.infection_rate)
    }

    pub fn mortality_rate_for(&self, location: &str) -> f64 {
        self.mortality_rate_overrides
            .get(location)
            .copied()
            .unwrap_or(self.mortality_rate)
    }
}

pub const LOCATION_DATA_KEY: &str = "LOCATION_DATA";
pub const SCENARIO_KEY: &str = "SCENARIO";

/// The JSON parameters file, the only persistent store in this system.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    path: PathBuf,
}

impl ParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scenario parameters from the `SCENARIO` key; all-defaults when the
    /// file or the key is missing.
    pub fn scenario(&self) -> anyhow::Result<ScenarioParams> {
        match read_json_key(&self.path, SCENARIO_KEY)? {
            Some(v) => serde_json::from_value(v).context("invalid SCENARIO parameters"),
            None => Ok(ScenarioParams::default()),
        }
    }

    pub fn write_scenario(&self, scenario: &ScenarioParams) -> anyhow::Result<()> {
        update_json_key(&self.path, SCENARIO_KEY, scenario)
    }

    pub fn write_location_data(&self, records: &[LocationRecord]) -> anyhow::Result<()> {
        update_json_key(&self.path, LOCATION_DATA_KEY, &records)
    }

    pub fn read_location_data(&self) -> anyhow::Result<Vec<LocationRecord>> {
        let v = read_json_key(&self.path, LOCATION_DATA_KEY)?
            .with_context(|| format!("no LOCATION_DATA in {}", self.path.display()))?;
        serde_json::from_value(v).context("invalid LOCATION_DATA")
    }

    /// Write an allocation result into the persisted records' per-band
    /// `VACCINE_ALLOCATION` maps.
    pub fn write_vaccine_allocation(&self, result: &AllocationResult) -> anyhow::Result<()> {
        let mut records = self.read_location_data()?;
        ensure!(
            records.len() == result.per_location.len(),
            "allocation covers {} locations but LOCATION_DATA has {}",
            result.per_location.len(),
            records.len()
        );
        for (record, allocation) in records.iter_mut().zip(result.per_location.iter()) {
            record.vaccine_allocation = *allocation;
        }
        self.write_location_data(&records)
    }
}

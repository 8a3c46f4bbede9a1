use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::model::age::BandedCounts;

/// Epidemiological compartment counts for one location, in real-population
/// units. Serialized under the `DATA` key with lowercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompartmentCounts {
    pub susceptible: u32,
    pub exposed: u32,
    pub infected: u32,
    pub recovered: u32,
    pub dead: u32,
}

impl CompartmentCounts {
    pub fn total(&self) -> u32 {
        self.susceptible + self.exposed + self.infected + self.recovered + self.dead
    }
}

/// One entry of the persisted `LOCATION_DATA` array. The field names follow
/// the parameters-file keys exactly so the JSON round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "LOCATION_NAME")]
    pub location_name: String,
    #[serde(rename = "POPULATION")]
    pub population: u32,
    #[serde(rename = "DATA")]
    pub data: CompartmentCounts,
    #[serde(rename = "VACCINE_ALLOCATION")]
    pub vaccine_allocation: BandedCounts,
    #[serde(rename = "SUSCEPTIBLE_AGENTS")]
    pub susceptible_agents: BandedCounts,
}

impl LocationRecord {
    pub fn zeroed(location_name: impl Into<String>, population: u32) -> Self {
        Self {
            location_name: location_name.into(),
            population,
            data: CompartmentCounts::default(),
            vaccine_allocation: BandedCounts::zero(),
            susceptible_agents: BandedCounts::zero(),
        }
    }

    /// Standing invariants: compartments sum to the population and the
    /// susceptible bands sum to the susceptible compartment.
    pub fn check_counts(&self) -> anyhow::Result<()> {
        ensure!(
            self.data.total() == self.population,
            "location '{}': compartments sum to {} but population is {}",
            self.location_name,
            self.data.total(),
            self.population
        );
        ensure!(
            self.susceptible_agents.total() == self.data.susceptible,
            "location '{}': susceptible bands sum to {} but DATA.susceptible is {}",
            self.location_name,
            self.susceptible_agents.total(),
            self.data.susceptible
        );
        Ok(())
    }

    /// Full check: the standing invariants plus the allocation cap. The cap
    /// only holds at allocation time; once doses are administered the
    /// susceptible bands fall below the recorded plan.
    pub fn check(&self) -> anyhow::Result<()> {
        self.check_counts()?;
        for band in 0..crate::model::age::N_AGE_BANDS {
            ensure!(
                self.vaccine_allocation.value(band) <= self.susceptible_agents.value(band),
                "location '{}': band {} allocated {} doses for {} susceptibles",
                self.location_name,
                band,
                self.vaccine_allocation.value(band),
                self.susceptible_agents.value(band)
            );
        }
        Ok(())
    }
}

/// Per-location census taken from the agent population, in real-population
/// units (already scaled back up).
#[derive(Debug, Clone, Default)]
pub struct LocationCensus {
    pub counts: CompartmentCounts,
    pub vaccinated: u32,
    pub susceptible_bands: BandedCounts,
}

#[cfg(test)]
mod tests {
    use super::{CompartmentCounts, LocationRecord};

    #[test]
    fn zeroed_record_passes_checks() {
        let mut rec = LocationRecord::zeroed("loc_1", 0);
        rec.check().expect("zeroed record");
        rec.population = 10;
        assert!(rec.check().is_err());
    }

    #[test]
    fn check_rejects_band_drift() {
        let mut rec = LocationRecord::zeroed("loc_1", 100);
        rec.data = CompartmentCounts { susceptible: 90, exposed: 5, infected: 5, recovered: 0, dead: 0 };
        rec.susceptible_agents.set(3, 90);
        rec.check().expect("aligned record");

        rec.susceptible_agents.set(3, 80);
        assert!(rec.check().is_err());
    }

    #[test]
    fn check_rejects_over_allocation() {
        let mut rec = LocationRecord::zeroed("loc_1", 50);
        rec.data.susceptible = 50;
        rec.susceptible_agents.set(2, 50);
        rec.vaccine_allocation.set(2, 50);
        rec.check().expect("full allocation is allowed");

        rec.vaccine_allocation.set(2, 51);
        assert!(rec.check().is_err());
    }

    #[test]
    fn serializes_with_the_parameters_file_keys() {
        let rec = LocationRecord::zeroed("Paramaribo", 1000);
        let json = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(json["LOCATION_NAME"], "Paramaribo");
        assert_eq!(json["POPULATION"], 1000);
        assert_eq!(json["DATA"]["susceptible"], 0);
        assert_eq!(json["VACCINE_ALLOCATION"]["age_00-09"]["value"], 0);
        assert_eq!(json["SUSCEPTIBLE_AGENTS"]["age_80-up"]["max"], 100);
    }
}

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::math::apportion::apportion;

pub const N_AGE_BANDS: usize = 9;

/// Decade age bands, in persisted key order. The open-ended band keeps an
/// upper bound of 100 in the serialized form.
pub const AGE_BANDS: [AgeBand; N_AGE_BANDS] = [
    AgeBand { key: "age_00-09", min: 0, max: 9 },
    AgeBand { key: "age_10-19", min: 10, max: 19 },
    AgeBand { key: "age_20-29", min: 20, max: 29 },
    AgeBand { key: "age_30-39", min: 30, max: 39 },
    AgeBand { key: "age_40-49", min: 40, max: 49 },
    AgeBand { key: "age_50-59", min: 50, max: 59 },
    AgeBand { key: "age_60-69", min: 60, max: 69 },
    AgeBand { key: "age_70-79", min: 70, max: 79 },
    AgeBand { key: "age_80-up", min: 80, max: 100 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBand {
    pub key: &'static str,
    pub min: u8,
    pub max: u8,
}

/// Index of the band an age falls into; ages past 80 all land in the last band.
pub fn band_index(age: u8) -> usize {
    if age >= 80 {
        N_AGE_BANDS - 1
    } else {
        (age / 10) as usize
    }
}

/// Counts per age band. Serializes as the nested band map used in the
/// parameters file:
///
/// `{"age_00-09": {"min": 0, "max": 9, "value": n}, ...}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandedCounts {
    values: [u32; N_AGE_BANDS],
}

impl BandedCounts {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_values(values: [u32; N_AGE_BANDS]) -> Self {
        Self { values }
    }

    /// Split `total` across the bands by weight, conserving the total.
    pub fn from_weights(total: u32, weights: &[f64; N_AGE_BANDS]) -> Self {
        let parts = apportion(total, weights);
        let mut values = [0u32; N_AGE_BANDS];
        values.copy_from_slice(&parts);
        Self { values }
    }

    pub fn value(&self, band: usize) -> u32 {
        self.values[band]
    }

    pub fn set(&mut self, band: usize, value: u32) {
        self.values[band] = value;
    }

    pub fn add(&mut self, band: usize, amount: u32) {
        self.values[band] += amount;
    }

    pub fn values(&self) -> &[u32; N_AGE_BANDS] {
        &self.values
    }

    pub fn total(&self) -> u32 {
        self.values.iter().sum()
    }

    /// Band values as one f64 matrix row (for the susceptible matrix).
    pub fn as_row(&self) -> Vec<f64> {
        self.values.iter().map(|v| *v as f64).collect()
    }
}

#[derive(Serialize, Deserialize)]
struct BandCell {
    min: u8,
    max: u8,
    value: u32,
}

impl Serialize for BandedCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(N_AGE_BANDS))?;
        for (band, value) in AGE_BANDS.iter().zip(self.values.iter()) {
            map.serialize_entry(
                band.key,
                &BandCell {
                    min: band.min,
                    max: band.max,
                    value: *value,
                },
            )?;
        }
        map.end()
    }
}

struct BandedCountsVisitor;

impl<'de> Visitor<'de> for BandedCountsVisitor {
    type Value = BandedCounts;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map from age band keys to {{min, max, value}} objects")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut values = [0u32; N_AGE_BANDS];
        let mut seen = [false; N_AGE_BANDS];
        while let Some((key, cell)) = access.next_entry::<String, BandCell>()? {
            let idx = AGE_BANDS
                .iter()
                .position(|b| b.key == key)
                .ok_or_else(|| de::Error::custom(format!("unknown age band key '{}'", key)))?;
            if seen[idx] {
                return Err(de::Error::custom(format!("duplicate age band key '{}'", key)));
            }
            seen[idx] = true;
            values[idx] = cell.value;
        }
        for (band, seen) in AGE_BANDS.iter().zip(seen.iter()) {
            if !*seen {
                return Err(de::Error::custom(format!("missing age band key '{}'", band.key)));
            }
        }
        Ok(BandedCounts::from_values(values))
    }
}

impl<'de> Deserialize<'de> for BandedCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BandedCountsVisitor)
    }
}

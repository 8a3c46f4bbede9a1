use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::model::age::{AGE_BANDS, N_AGE_BANDS};

#[derive(Debug, Deserialize)]
struct PopRow {
    location: String,
    population: u32,
}

/// Load location names and populations from a CSV file with columns:
/// `location,population`. Returns them in file order.
pub fn load_locations_csv(path: &str) -> anyhow::Result<(Vec<String>, Vec<u32>)> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open locations CSV: {}", path))?;
    let mut locations = Vec::new();
    let mut populations = Vec::new();
    for result in rdr.deserialize::<PopRow>() {
        let row = result?;
        ensure!(
            !locations.contains(&row.location),
            "duplicate location '{}' in {}",
            row.location,
            path
        );
        locations.push(row.location);
        populations.push(row.population);
    }
    ensure!(!locations.is_empty(), "locations CSV is empty: {}", path);
    Ok((locations, populations))
}

/// Initial non-susceptible counts for one location.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CaseSeed {
    pub exposed: u32,
    pub infected: u32,
    pub recovered: u32,
    pub dead: u32,
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    location: String,
    exposed: u32,
    infected: u32,
    recovered: u32,
    dead: u32,
}

/// Load initial case seeds from a CSV file with columns:
/// `location,exposed,infected,recovered,dead`. Locations without a row seed
/// all-susceptible; rows naming unknown locations are an error.
pub fn load_case_seeds_csv(path: &str, locations: &[String]) -> anyhow::Result<Vec<CaseSeed>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open case seeds CSV: {}", path))?;
    let mut seeds = vec![CaseSeed::default(); locations.len()];
    for result in rdr.deserialize::<SeedRow>() {
        let row = result?;
        let idx = locations
            .iter()
            .position(|l| *l == row.location)
            .with_context(|| format!("case seed for unknown location '{}'", row.location))?;
        seeds[idx] = CaseSeed {
            exposed: row.exposed,
            infected: row.infected,
            recovered: row.recovered,
            dead: row.dead,
        };
    }
    Ok(seeds)
}

#[derive(Debug, Deserialize)]
struct ShareRow {
    location: String,
    age_band: String,
    share: f64,
}

/// Load per-location age-band shares from a long-format CSV with columns:
/// `location,age_band,share`. Every location needs all nine bands; shares
/// are weights, not required to sum to one.
pub fn load_age_shares_csv(path: &str, locations: &[String]) -> anyhow::Result<Vec<[f64; N_AGE_BANDS]>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open age shares CSV: {}", path))?;
    let mut shares = vec![[f64::NAN; N_AGE_BANDS]; locations.len()];
    for result in rdr.deserialize::<ShareRow>() {
        let row = result?;
        let loc = locations
            .iter()
            .position(|l| *l == row.location)
            .with_context(|| format!("age share for unknown location '{}'", row.location))?;
        let band = AGE_BANDS
            .iter()
            .position(|b| b.key == row.age_band)
            .with_context(|| format!("unknown age band '{}'", row.age_band))?;
        ensure!(row.share >= 0.0, "negative share for {}/{}", row.location, row.age_band);
        shares[loc][band] = row.share;
    }
    for (loc, bands) in shares.iter().enumerate() {
        for (band, share) in bands.iter().enumerate() {
            ensure!(
                !share.is_nan(),
                "missing age share for {}/{}",
                locations[loc],
                AGE_BANDS[band].key
            );
        }
    }
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::{load_age_shares_csv, load_case_seeds_csv, load_locations_csv};
    use crate::model::age::AGE_BANDS;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).expect("create csv");
        write!(f, "{}", body).expect("write csv");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn loads_locations_in_file_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_csv(&dir, "locations.csv", "location,population\nParamaribo,240000\nWanica,118000\n");
        let (locations, populations) = load_locations_csv(&path).expect("load");
        assert_eq!(locations, vec!["Paramaribo", "Wanica"]);
        assert_eq!(populations, vec![240000, 118000]);
    }

    #[test]
    fn rejects_duplicate_locations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_csv(&dir, "locations.csv", "location,population\nWanica,1\nWanica,2\n");
        assert!(load_locations_csv(&path).is_err());
    }

    #[test]
    fn seeds_default_to_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            &dir,
            "seeds.csv",
            "location,exposed,infected,recovered,dead\nWanica,5,3,0,0\n",
        );
        let locations = vec!["Paramaribo".to_string(), "Wanica".to_string()];
        let seeds = load_case_seeds_csv(&path, &locations).expect("load");
        assert_eq!(seeds[0].infected, 0);
        assert_eq!(seeds[1].exposed, 5);
        assert_eq!(seeds[1].infected, 3);
    }

    #[test]
    fn age_shares_require_all_bands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locations = vec!["Wanica".to_string()];

        let mut body = String::from("location,age_band,share\n");
        for band in AGE_BANDS.iter().take(8) {
            body.push_str(&format!("Wanica,{},0.1\n", band.key));
        }
        let partial = write_csv(&dir, "partial.csv", &body);
        assert!(load_age_shares_csv(&partial, &locations).is_err());

        body.push_str("Wanica,age_80-up,0.2\n");
        let full = write_csv(&dir, "full.csv", &body);
        let shares = load_age_shares_csv(&full, &locations).expect("load");
        assert_eq!(shares[0][8], 0.2);
    }
}

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::collect::ReporterRow;
use crate::io::run_log::write_run_log;
use crate::math::apportion::apportion;
use crate::model::age::{band_index, AGE_BANDS, BandedCounts, N_AGE_BANDS};
use crate::model::location::LocationCensus;
use crate::model::person::{HealthStatus, Person, Severity, ViralLoad};
use crate::optimize::AllocationResult;
use crate::space::environment::GeoEnvironment;

/// The stepping model: scaled person agents on top of the environment. Each
/// step advances disease state, applies the pending vaccine allocation,
/// has the environment observe the census, and collects; every
/// `allocation_interval` steps the environment refreshes the allocation.
pub struct EpidemicModel {
    env: GeoEnvironment,
    persons: Vec<Person>,
    rng: StdRng,
    step: u32,
    timeline: Vec<ReporterRow>,
    // agent-unit doses from the latest allocation, consumed as they are
    // administered and replaced at every refresh
    pending_doses: Vec<[u32; N_AGE_BANDS]>,
}

impl EpidemicModel {
    pub fn new(env: GeoEnvironment) -> anyhow::Result<Self> {
        let seed = env.scenario().seed;
        let mut rng = StdRng::seed_from_u64(seed);
        let persons = spawn_persons(&env, &mut rng)?;
        info!("spawned {} agents across {} locations", persons.len(), env.locations().len());
        let pending_doses = vec![[0u32; N_AGE_BANDS]; env.locations().len()];
        Ok(Self { env, persons, rng, step: 0, timeline: Vec::new(), pending_doses })
    }

    pub fn env(&self) -> &GeoEnvironment {
        &self.env
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn step_count(&self) -> u32 {
        self.step
    }

    pub fn timeline(&self) -> &[ReporterRow] {
        &self.timeline
    }

    /// Advance the model one step.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.step += 1;
        self.progress_disease();
        self.apply_vaccination();

        let censuses = self.census();
        self.env.observe(&censuses)?;

        let rows: Vec<ReporterRow> = censuses.iter().map(reporter_row).collect();
        let mut totals = ReporterRow::default();
        for row in &rows {
            totals.susceptible += row.susceptible;
            totals.exposed += row.exposed;
            totals.infected += row.infected;
            totals.deaths += row.deaths;
            totals.recovered += row.recovered;
            totals.vaccinated += row.vaccinated;
        }
        self.timeline.push(totals);
        self.env.collect(&rows)?;

        if self.step % self.env.scenario().allocation_interval.max(1) == 0 {
            let result = self.env.refresh()?;
            let scale = self.env.scenario().scale.max(1);
            self.pending_doses = pending_agent_doses(&result, scale);
        }
        Ok(())
    }

    pub fn run(&mut self, steps: u32) -> anyhow::Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Write the plain-text log of the run so far.
    pub fn write_log(
        &self,
        out_dir: impl AsRef<std::path::Path>,
        run_id: &str,
    ) -> anyhow::Result<std::path::PathBuf> {
        write_run_log(
            out_dir,
            run_id,
            self.env.locations().len(),
            self.env.scenario().scale,
            self.env.scenario().seed,
            &self.timeline,
        )
    }

    fn progress_disease(&mut self) {
        let scenario = self.env.scenario();
        let incubation = scenario.incubation_days;
        let course_end = scenario.incubation_days + scenario.infectious_days;

        // Snapshot the force of infection before any state flips this step.
        let n = self.env.locations().len();
        let mut infectious = vec![0u32; n];
        let mut alive = vec![0u32; n];
        for p in &self.persons {
            if p.is_infected() {
                infectious[p.location] += 1;
            }
            if !p.is_dead() {
                alive[p.location] += 1;
            }
        }

        for p in self.persons.iter_mut() {
            match p.status {
                HealthStatus::Susceptible => {
                    if alive[p.location] == 0 || infectious[p.location] == 0 {
                        continue;
                    }
                    let mut foi = self.env.infection_rate(p.location)
                        * infectious[p.location] as f64
                        / alive[p.location] as f64;
                    if p.facemask {
                        foi *= 0.5;
                    }
                    if p.distancing {
                        foi *= 0.5;
                    }
                    foi *= 1.0 - p.immunity;
                    if self.rng.gen::<f64>() < foi {
                        p.status = HealthStatus::Exposed;
                        p.severity = Severity::Exposed;
                        p.viral_load = ViralLoad::Low;
                        p.time_infected = 0;
                    }
                }
                HealthStatus::Exposed => {
                    p.time_infected += 1;
                    if p.time_infected >= incubation {
                        p.status = HealthStatus::Infected;
                        p.severity = draw_severity(&mut self.rng);
                        p.viral_load = draw_viral_load(&mut self.rng);
                    }
                }
                HealthStatus::Infected => {
                    p.time_infected += 1;
                    if p.time_infected >= course_end {
                        if self.rng.gen::<f64>() < self.env.mortality_rate(p.location) {
                            p.status = HealthStatus::Dead;
                        } else {
                            p.status = HealthStatus::Recovered;
                            p.immunity = 1.0;
                        }
                    }
                }
                HealthStatus::Recovered | HealthStatus::Dead | HealthStatus::Vaccinated => {}
            }
        }
    }

    /// Administer the pending allocation: non-hesitant susceptibles of the
    /// allocated band, until the doses run out.
    fn apply_vaccination(&mut self) {
        for p in self.persons.iter_mut() {
            if !p.is_susceptible() || p.vaccine_hesitant {
                continue;
            }
            let band = band_index(p.age);
            if self.pending_doses[p.location][band] > 0 {
                self.pending_doses[p.location][band] -= 1;
                p.status = HealthStatus::Vaccinated;
                p.immunity = 1.0;
            }
        }
    }

    /// Per-location census, scaled back to real-population units so each
    /// location's compartments sum to its population exactly. Vaccinated
    /// agents count as recovered in the compartment data; the census keeps
    /// them separately for the reporters.
    fn census(&self) -> Vec<LocationCensus> {
        let n = self.env.locations().len();
        let mut status_counts = vec![[0u32; 6]; n];
        let mut band_counts = vec![[0.0f64; N_AGE_BANDS]; n];
        for p in &self.persons {
            let slot = match p.status {
                HealthStatus::Susceptible => 0,
                HealthStatus::Exposed => 1,
                HealthStatus::Infected => 2,
                HealthStatus::Dead => 3,
                HealthStatus::Recovered => 4,
                HealthStatus::Vaccinated => 5,
            };
            status_counts[p.location][slot] += 1;
            if p.is_susceptible() {
                band_counts[p.location][band_index(p.age)] += 1.0;
            }
        }

        let mut out = Vec::with_capacity(n);
        for loc in 0..n {
            let weights: Vec<f64> = status_counts[loc].iter().map(|c| *c as f64).collect();
            let scaled = apportion(self.env.population()[loc], &weights);
            let counts = crate::model::location::CompartmentCounts {
                susceptible: scaled[0],
                exposed: scaled[1],
                infected: scaled[2],
                dead: scaled[3],
                recovered: scaled[4] + scaled[5],
            };
            let susceptible_bands = BandedCounts::from_weights(scaled[0], &band_counts[loc]);
            out.push(LocationCensus {
                counts,
                vaccinated: scaled[5],
                susceptible_bands,
            });
        }
        out
    }
}

/// Scale a real-unit allocation down to whole agent doses. The dose total is
/// rounded once and apportioned over the allocation cells; flooring each cell
/// on its own would zero out every cell smaller than `scale`.
fn pending_agent_doses(result: &AllocationResult, scale: u32) -> Vec<[u32; N_AGE_BANDS]> {
    let mut out = vec![[0u32; N_AGE_BANDS]; result.per_location.len()];
    let doses = (result.allocated + scale / 2) / scale;
    if doses == 0 {
        return out;
    }
    let weights: Vec<f64> = result.per_location.iter().flat_map(|b| b.as_row()).collect();
    for (cell, count) in apportion(doses, &weights).into_iter().enumerate() {
        out[cell / N_AGE_BANDS][cell % N_AGE_BANDS] = count;
    }
    out
}

fn reporter_row(census: &LocationCensus) -> ReporterRow {
    ReporterRow {
        susceptible: census.counts.susceptible,
        exposed: census.counts.exposed,
        infected: census.counts.infected,
        deaths: census.counts.dead,
        recovered: census.counts.recovered - census.vaccinated,
        vaccinated: census.vaccinated,
    }
}

/// Partition each location's scaled agent count over the seeded compartments
/// and draw ages from the location's susceptible band distribution.
fn spawn_persons(env: &GeoEnvironment, rng: &mut StdRng) -> anyhow::Result<Vec<Person>> {
    let scenario = env.scenario();
    let scale = scenario.scale.max(1);
    let mut persons = Vec::new();

    for (loc, record) in env.records().iter().enumerate() {
        if record.population == 0 {
            continue;
        }
        // small locations still get one agent
        let n_agents = (record.population / scale).max(1);

        let weights = [
            record.data.susceptible as f64,
            record.data.exposed as f64,
            record.data.infected as f64,
            record.data.recovered as f64,
            record.data.dead as f64,
        ];
        let per_status = apportion(n_agents, &weights);
        let statuses = [
            HealthStatus::Susceptible,
            HealthStatus::Exposed,
            HealthStatus::Infected,
            HealthStatus::Recovered,
            HealthStatus::Dead,
        ];

        let band_weights: Vec<f64> = record.susceptible_agents.as_row();
        let total_weight: f64 = band_weights.iter().sum();

        for (status, count) in statuses.iter().zip(per_status.iter()) {
            for _ in 0..*count {
                let age = draw_age(rng, &band_weights, total_weight);
                let mut p = Person::susceptible(age, loc);
                p.status = *status;
                p.facemask = rng.gen::<f64>() < scenario.facemask_share;
                p.distancing = rng.gen::<f64>() < scenario.distancing_share;
                p.vaccine_hesitant = rng.gen::<f64>() < scenario.hesitancy_share;
                match status {
                    HealthStatus::Exposed => p.severity = Severity::Exposed,
                    HealthStatus::Infected => {
                        p.severity = draw_severity(rng);
                        p.viral_load = draw_viral_load(rng);
                    }
                    HealthStatus::Recovered => p.immunity = 1.0,
                    _ => {}
                }
                persons.push(p);
            }
        }
    }
    Ok(persons)
}

fn draw_age(rng: &mut StdRng, band_weights: &[f64], total_weight: f64) -> u8 {
    let band = if total_weight > 0.0 {
        let mut pick = rng.gen::<f64>() * total_weight;
        let mut chosen = N_AGE_BANDS - 1;
        for (idx, w) in band_weights.iter().enumerate() {
            if pick < *w {
                chosen = idx;
                break;
            }
            pick -= w;
        }
        chosen
    } else {
        rng.gen_range(0..N_AGE_BANDS)
    };
    let b = AGE_BANDS[band];
    rng.gen_range(b.min..=b.max)
}

fn draw_severity(rng: &mut StdRng) -> Severity {
    let x = rng.gen::<f64>();
    if x < 0.6 {
        Severity::Mild
    } else if x < 0.9 {
        Severity::Moderate
    } else {
        Severity::Severe
    }
}

fn draw_viral_load(rng: &mut StdRng) -> ViralLoad {
    let x = rng.gen::<f64>();
    if x < 0.5 {
        ViralLoad::Low
    } else if x < 0.8 {
        ViralLoad::Medium
    } else {
        ViralLoad::High
    }
}
